//! Small HTTP relay that forwards profile lookups to LeetCode's GraphQL endpoint,
//! so callers without cross-origin access can still sync.

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use graphql_client::QueryBody;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::set_header::SetResponseHeaderLayer;

use std::sync::LazyLock;
use std::time::Duration;

use crate::lcapi::{REQUEST_TIMEOUT, USER_PROFILE_QUERY};

pub const ROUTE: &str = "/api/leetcode";
pub const LEETCODE_GRAPHQL: &str = "https://leetcode.com/graphql";

/// Upstream error bodies are cut to this many characters.
const ERROR_BODY_LIMIT: usize = 200;

static UNSAFE_USERNAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("static regex"));

#[derive(Clone)]
struct ProxyState {
    http: reqwest::Client,
    upstream: String,
}

#[derive(Deserialize)]
struct ProxyRequest {
    #[serde(default)]
    username: Option<String>,
}

/// Strips everything outside `[A-Za-z0-9_-]`.
pub fn sanitize_username(raw: &str) -> String {
    UNSAFE_USERNAME_CHARS.replace_all(raw, "").into_owned()
}

fn truncate(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

fn error(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn upstream_headers() -> HeaderMap {
    HeaderMap::from_iter([
        (header::REFERER, HeaderValue::from_static("https://leetcode.com")),
        (header::ORIGIN, HeaderValue::from_static("https://leetcode.com")),
        (header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0")),
    ])
}

/// Router serving the relay at [`ROUTE`], forwarding to `upstream`.
///
/// Every response carries permissive CORS headers, errors included.
pub fn router(upstream: impl Into<String>) -> Result<Router> {
    router_with_timeout(upstream, REQUEST_TIMEOUT)
}

/// As [`router`], giving up on LeetCode after `timeout`.
pub fn router_with_timeout(upstream: impl Into<String>, timeout: Duration) -> Result<Router> {
    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Could not build HTTP client")?;
    let state = ProxyState { http, upstream: upstream.into() };

    let app = Router::new()
        .route(ROUTE, any(relay))
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ));
    Ok(app)
}

async fn relay(State(state): State<ProxyState>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return error(StatusCode::METHOD_NOT_ALLOWED, json!({ "error": "Method not allowed" }));
    }

    let username = serde_json::from_slice::<ProxyRequest>(&body)
        .ok()
        .and_then(|req| req.username)
        .map(|raw| sanitize_username(&raw))
        .filter(|name| !name.is_empty());

    let Some(username) = username else {
        return error(StatusCode::BAD_REQUEST, json!({ "error": "Username required" }));
    };

    log::debug!("[relay] forwarding profile lookup for {username}");
    let query = QueryBody {
        variables: json!({ "username": username }),
        query: USER_PROFILE_QUERY,
        operation_name: "userProfile",
    };

    let response = state
        .http
        .post(&state.upstream)
        .headers(upstream_headers())
        .json(&query)
        .send()
        .await;

    let (status, text) = match response {
        Ok(response) => {
            let status = response.status();
            match response.text().await {
                Ok(text) => (status, text),
                Err(err) => return transport_failure(err),
            }
        }
        Err(err) => return transport_failure(err),
    };

    if !status.is_success() {
        log::warn!("[relay] LeetCode answered {status}");
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": format!("LeetCode returned {status}"), "details": truncate(&text) }),
        );
    }

    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], text).into_response()
}

fn transport_failure(err: reqwest::Error) -> Response {
    log::warn!("[relay] request to LeetCode failed: {err}");
    error(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "Failed to fetch from LeetCode", "details": err.to_string() }),
    )
}

/// Binds `bind` and serves the relay until the process is stopped.
pub async fn serve(bind: &str, upstream: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Could not bind proxy to {bind}"))?;

    log::info!("[serve] proxy listening on http://{bind}{ROUTE}, forwarding to {upstream}");
    axum::serve(listener, router(upstream)?).await.context("Proxy server stopped")
}
