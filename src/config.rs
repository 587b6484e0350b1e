//! Configuration for a single ETL run.
//!
//! Values come from three layers, later layers winning:
//!
//! 1. Built-in defaults (Spamhaus DROP feed, `etl_database.spamhaus_raw`)
//! 2. An optional TOML file passed with `--config`
//! 3. Environment variables (`DROPLIST_*`, optionally loaded from `.env`)
//!
//! The store connection string is only accepted from the environment and is
//! held as a [`SecretString`] so it never reaches logs through `Debug`.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::feed::{RetryPolicy, DEFAULT_FEED_URL, DEFAULT_SOURCE_TAG};
use crate::storage::is_valid_name;

/// Storage connection string (required for loading)
pub const ENV_STORE_URI: &str = "DROPLIST_STORE_URI";
/// Database name override
pub const ENV_STORE_DB: &str = "DROPLIST_STORE_DB";
/// Feed URL override
pub const ENV_FEED_URL: &str = "DROPLIST_FEED_URL";
/// Retry budget override
pub const ENV_MAX_ATTEMPTS: &str = "DROPLIST_MAX_ATTEMPTS";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("DROPLIST_STORE_URI is not set")]
    MissingStoreUri,

    #[error("Invalid feed URL {url:?}: {reason}")]
    InvalidFeedUrl { url: String, reason: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub store: StoreConfig,
}

/// `[feed]` section: where to fetch from and how hard to try.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    /// Tag written to every record's `source` field
    pub source: String,
    pub max_attempts: u32,
    pub backoff_base: u64,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            source: DEFAULT_SOURCE_TAG.to_string(),
            max_attempts: policy.max_attempts,
            backoff_base: policy.base,
            request_timeout_secs: policy.per_attempt_timeout.as_secs(),
            max_body_bytes: policy.max_body_bytes,
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string; environment only.
    #[serde(skip)]
    pub uri: Option<SecretString>,
    pub database: String,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: None,
            database: "etl_database".to_string(),
            collection: "spamhaus_raw".to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), feed = %config.feed.url, "Loaded configuration");
        Ok(config)
    }

    /// Apply environment overrides, reading variables through `lookup`.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(uri) = get(ENV_STORE_URI) {
            self.store.uri = Some(SecretString::from(uri));
        }
        if let Some(db) = get(ENV_STORE_DB) {
            self.store.database = db;
        }
        if let Some(url) = get(ENV_FEED_URL) {
            self.feed.url = url;
        }
        if let Some(attempts) = get(ENV_MAX_ATTEMPTS) {
            self.feed.max_attempts = attempts.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    key: ENV_MAX_ATTEMPTS,
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(())
    }

    /// File (if any) plus process environment.
    pub fn from_file_and_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Check the assembled configuration.
    ///
    /// `require_store` is false for dry runs, which never open the store.
    pub fn validate(&self, require_store: bool) -> Result<(), ConfigError> {
        if require_store && self.store.uri.is_none() {
            return Err(ConfigError::MissingStoreUri);
        }

        let url = Url::parse(&self.feed.url).map_err(|e| ConfigError::InvalidFeedUrl {
            url: self.feed.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidFeedUrl {
                url: self.feed.url.clone(),
                reason: format!("unsupported scheme {} (only http/https allowed)", url.scheme()),
            });
        }

        if self.feed.max_attempts == 0 {
            return Err(invalid("feed.max_attempts", "must be at least 1"));
        }
        if self.feed.backoff_base == 0 {
            return Err(invalid("feed.backoff_base", "must be at least 1"));
        }
        if self.feed.request_timeout_secs == 0 {
            return Err(invalid("feed.request_timeout_secs", "must be at least 1"));
        }
        if self.feed.source.trim().is_empty() {
            return Err(invalid("feed.source", "must not be empty"));
        }
        if !is_valid_name(&self.store.database) {
            return Err(invalid("store.database", "must be a plain identifier"));
        }
        if !is_valid_name(&self.store.collection) {
            return Err(invalid("store.collection", "must be a plain identifier"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.feed.max_attempts,
            base: self.feed.backoff_base,
            per_attempt_timeout: Duration::from_secs(self.feed.request_timeout_secs),
            max_body_bytes: self.feed.max_body_bytes,
        }
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        reason: reason.to_string(),
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    const FEED_KEYS: [&str; 6] = [
        "url",
        "source",
        "max_attempts",
        "backoff_base",
        "request_timeout_secs",
        "max_body_bytes",
    ];
    const STORE_KEYS: [&str; 2] = ["database", "collection"];

    for (key, value) in raw {
        let known: &[&str] = match key.as_str() {
            "feed" => &FEED_KEYS,
            "store" => &STORE_KEYS,
            _ => {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                continue;
            }
        };
        if let Some(table) = value.as_table() {
            for sub in table.keys() {
                if !known.contains(&sub.as_str()) {
                    tracing::warn!(key = %format!("{key}.{sub}"), "Unknown key in config file, ignoring");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
