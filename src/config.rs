use anyhow::{Context, Result};

use std::env;
use std::path::PathBuf;

use crate::lcapi::{self, proxy};
use crate::sheets;

pub const DEFAULT_DB_PATH: &str = "codetrack.db";
pub const DEFAULT_CALL_TOKEN: char = '$';
pub const DEFAULT_PROXY_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_BACKUP_DIR: &str = "backups";

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub call_token: char,
    pub discord_token: Option<String>,
    pub announcements_channel: Option<u64>,
    pub public_api: String,
    pub proxy_url: String,
    pub graphql_url: String,
    pub proxy_bind: String,
    pub extra_sheets: Option<PathBuf>,
    /// Sheet imported into an empty store; `None` disables seeding.
    pub seed_sheet: Option<String>,
    /// `export`/`restore` only touch files inside this folder.
    pub backup_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset and empty values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let announcements_channel = get("ANNOUNCEMENTS_CHANNEL_ID")
            .map(|id| id.parse::<u64>())
            .transpose()
            .context("ANNOUNCEMENTS_CHANNEL_ID must be a numeric channel id")?;

        let seed_sheet = match lookup("CODETRACK_SEED_SHEET") {
            Some(key) => Some(key.trim().to_string()).filter(|k| !k.is_empty()),
            None => Some(sheets::DEFAULT_SEED_SHEET.to_string()),
        };

        Ok(Self {
            db_path: PathBuf::from(or("CODETRACK_DB", DEFAULT_DB_PATH)),
            call_token: get("BOT_CALL_TOKEN").map_or(DEFAULT_CALL_TOKEN, |t| parse_call_token(&t)),
            discord_token: get("DISCORD_TOKEN"),
            announcements_channel,
            public_api: or("LC_PUBLIC_API", lcapi::DEFAULT_PUBLIC_API),
            proxy_url: or("LC_PROXY_URL", lcapi::DEFAULT_PROXY_URL),
            graphql_url: or("LC_GRAPHQL_URL", proxy::LEETCODE_GRAPHQL),
            proxy_bind: or("PROXY_BIND", DEFAULT_PROXY_BIND),
            extra_sheets: get("CODETRACK_SHEETS").map(PathBuf::from),
            seed_sheet,
            backup_dir: PathBuf::from(or("CODETRACK_BACKUP_DIR", DEFAULT_BACKUP_DIR)),
        })
    }

    pub fn discord_token(&self) -> Result<&str> {
        self.discord_token
            .as_deref()
            .context("Expected 'DISCORD_TOKEN=<token>' in .env in project root.")
    }
}

/// The call token is a single character; anything longer is cut down to its first one.
fn parse_call_token(raw: &str) -> char {
    let mut chars = raw.chars();
    let Some(token) = chars.next() else {
        return DEFAULT_CALL_TOKEN;
    };

    if chars.next().is_some() {
        log::warn!("[parse_call_token] BOT_CALL_TOKEN must be a single character; using '{token}'");
    }
    token
}
