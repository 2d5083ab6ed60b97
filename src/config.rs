//! Deserializable shipper settings.
//!
//! [`ShipperConfig`] lets an embedding application keep shipping settings in
//! its own configuration file or environment and turn them into a
//! [`Shipper`](crate::Shipper) with [`Shipper::from_config`](crate::Shipper::from_config).

use crate::endpoint::DEFAULT_INGEST_URL;
use crate::retry::{Backoff, MAX_RETRIES, RETRY_BASE_DELAY};
use crate::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable holding the account token.
pub const ENV_TOKEN: &str = "LOGSHIP_TOKEN";
/// Environment variable holding comma-separated default tags.
pub const ENV_TAGS: &str = "LOGSHIP_TAGS";
/// Environment variable overriding the ingestion base URL.
pub const ENV_INGEST_URL: &str = "LOGSHIP_INGEST_URL";
/// Environment variable overriding the retry ceiling.
pub const ENV_MAX_RETRIES: &str = "LOGSHIP_MAX_RETRIES";
/// Environment variable overriding the base backoff delay, in seconds.
pub const ENV_RETRY_BASE_SECS: &str = "LOGSHIP_RETRY_BASE_SECS";

/// Settings for a [`Shipper`](crate::Shipper).
///
/// Every field has a default, so partial documents deserialize.
///
/// # Examples
///
/// ```
/// use logship::ShipperConfig;
///
/// let config: ShipperConfig = serde_json::from_str(
///     r#"{ "token": "abc123", "tags": ["env:prod"] }"#,
/// ).unwrap();
///
/// assert_eq!(config.token.as_deref(), Some("abc123"));
/// assert_eq!(config.max_retries, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShipperConfig {
    /// Account token. Sends fail validation until one is set.
    pub token: Option<String>,

    /// Default tags, placed ahead of per-call tags.
    pub tags: Vec<String>,

    /// Ingestion base URL.
    pub ingest_url: String,

    /// Delay before the first retry, in seconds.
    pub retry_base_secs: u64,

    /// Retries after the initial attempt.
    pub max_retries: usize,

    /// Randomize backoff delays.
    pub jitter: bool,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            token: None,
            tags: Vec::new(),
            ingest_url: DEFAULT_INGEST_URL.to_string(),
            retry_base_secs: RETRY_BASE_DELAY.as_secs(),
            max_retries: MAX_RETRIES,
            jitter: false,
        }
    }
}

impl ShipperConfig {
    /// Reads settings from `LOGSHIP_*` environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(token) = lookup(ENV_TOKEN).filter(|t| !t.is_empty()) {
            config.token = Some(token);
        }
        if let Some(tags) = lookup(ENV_TAGS) {
            config.tags = tags
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(url) = lookup(ENV_INGEST_URL) {
            config.ingest_url = url;
        }
        if let Some(value) = lookup(ENV_MAX_RETRIES) {
            config.max_retries = parse_number(ENV_MAX_RETRIES, &value)?;
        }
        if let Some(value) = lookup(ENV_RETRY_BASE_SECS) {
            config.retry_base_secs = parse_number(ENV_RETRY_BASE_SECS, &value)?;
        }

        Ok(config)
    }

    /// The backoff schedule these settings describe.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(Duration::from_secs(self.retry_base_secs), self.max_retries)
            .with_jitter(self.jitter)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::ConfigurationError(format!("Invalid {}={:?}: {}", key, value, e)))
}
