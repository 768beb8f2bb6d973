//! LeetCode profile sync.
//!
//! Two strategies are tried in order: the public stats API, then our own
//! relay (see [`proxy`]). Whatever comes back is decoded into a
//! [`ProfileResponse`].

use anyhow::{anyhow, Context, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use std::time::Duration;

use crate::models::ProfileStats;

pub mod proxy;

pub const USER_PROFILE_QUERY: &str = include_str!("lcapi/user_profile.graphql");

pub const DEFAULT_PUBLIC_API: &str = "https://alfa-leetcode-api.onrender.com";
pub const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:3000/api/leetcode";

/// Upper bound for one profile request, connection included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Enter a LeetCode username first.")]
    MissingUsername,
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Sync failed, try again later (all sync methods failed).")]
    AllMethodsFailed,
}

#[derive(Deserialize)]
struct AcCount {
    difficulty: String,
    count: u64,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SubmitStats {
    #[serde(default)]
    ac_submission_num: Vec<AcCount>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchedUser {
    username: String,
    #[serde(default)]
    submit_stats_global: Option<SubmitStats>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatProfile {
    total_solved: Option<u64>,
    easy_solved: Option<u64>,
    medium_solved: Option<u64>,
    hard_solved: Option<u64>,
}

/// The two payload shapes we know how to read.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileResponse {
    /// GraphQL shape, as relayed by the proxy.
    Graph { username: String, stats: ProfileStats },
    /// Flat shape returned by the public stats API.
    Flat(ProfileStats),
    Unrecognized,
}

impl ProfileResponse {
    pub fn decode(value: &Value) -> Self {
        if let Some(user) = value.pointer("/data/matchedUser").filter(|u| !u.is_null()) {
            return match MatchedUser::deserialize(user) {
                Ok(user) => Self::from_graph(user),
                Err(err) => {
                    log::warn!("[ProfileResponse::decode] malformed matchedUser: {err}");
                    Self::Unrecognized
                }
            };
        }

        if value.get("totalSolved").is_some() {
            return match FlatProfile::deserialize(value) {
                Ok(flat) => Self::Flat(ProfileStats {
                    all: flat.total_solved.unwrap_or(0),
                    easy: flat.easy_solved.unwrap_or(0),
                    medium: flat.medium_solved.unwrap_or(0),
                    hard: flat.hard_solved.unwrap_or(0),
                }),
                Err(err) => {
                    log::warn!("[ProfileResponse::decode] malformed flat profile: {err}");
                    Self::Unrecognized
                }
            };
        }

        Self::Unrecognized
    }

    fn from_graph(user: MatchedUser) -> Self {
        let mut stats = ProfileStats::default();
        for entry in user.submit_stats_global.unwrap_or_default().ac_submission_num {
            match entry.difficulty.to_lowercase().as_str() {
                "all" => stats.all = entry.count,
                "easy" => stats.easy = entry.count,
                "medium" => stats.medium = entry.count,
                "hard" => stats.hard = entry.count,
                _ => {}
            }
        }

        Self::Graph { username: user.username, stats }
    }
}

/// Outcome of a successful sync.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncedProfile {
    pub display_name: String,
    pub stats: ProfileStats,
}

/// The public API's answer is only taken if it looks like a profile.
fn looks_like_profile(value: &Value) -> bool {
    value.get("totalSolved").is_some()
        || value.get("matchedUser").is_some_and(|user| !user.is_null())
}

pub struct ProfileClient {
    http: Client,
    public_api: String,
    proxy_url: String,
}

impl ProfileClient {
    pub fn new(public_api: impl Into<String>, proxy_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(public_api, proxy_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        public_api: impl Into<String>,
        proxy_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Could not build HTTP client")?;

        Ok(Self { http, public_api: public_api.into(), proxy_url: proxy_url.into() })
    }

    fn public_profile_url(&self, username: &str) -> Result<Url> {
        let mut url = Url::parse(&self.public_api)
            .with_context(|| format!("Invalid public API url: {}", self.public_api))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Public API url cannot have a path: {}", self.public_api))?
            .pop_if_empty()
            .push("userProfile")
            .push(username);
        Ok(url)
    }

    async fn via_public_api(&self, username: &str) -> Result<Value> {
        let response = self.http.get(self.public_profile_url(username)?).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("public API answered {}", response.status()));
        }

        let body = response.json::<Value>().await?;
        if !looks_like_profile(&body) {
            return Err(anyhow!("public API answer is not a profile"));
        }
        Ok(body)
    }

    async fn via_proxy(&self, username: &str) -> Result<Value> {
        let headers = HeaderMap::from_iter([(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )]);

        let response = self
            .http
            .post(&self.proxy_url)
            .headers(headers)
            .json(&serde_json::json!({ "username": username }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("proxy answered {}", response.status()));
        }

        Ok(response.json::<Value>().await?)
    }

    /// Fetches the raw profile payload, trying each strategy in turn.
    pub async fn fetch(&self, username: &str) -> Result<Value, SyncError> {
        match self.via_public_api(username).await {
            Ok(body) => return Ok(body),
            Err(err) => log::info!("[fetch] public API failed for {username}: {err:#}"),
        }

        match self.via_proxy(username).await {
            Ok(body) => Ok(body),
            Err(err) => {
                log::warn!("[fetch] proxy failed for {username}: {err:#}");
                Err(SyncError::AllMethodsFailed)
            }
        }
    }

    /// Looks up `username` and returns its solved counts. Nothing is stored here.
    pub async fn sync(&self, username: &str) -> Result<SyncedProfile, SyncError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(SyncError::MissingUsername);
        }

        let body = self.fetch(username).await?;
        match ProfileResponse::decode(&body) {
            ProfileResponse::Graph { username, stats } => {
                Ok(SyncedProfile { display_name: username, stats })
            }
            ProfileResponse::Flat(stats) => {
                Ok(SyncedProfile { display_name: username.to_string(), stats })
            }
            ProfileResponse::Unrecognized => Err(SyncError::UserNotFound(username.to_string())),
        }
    }
}
