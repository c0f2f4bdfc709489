//! Configuration management for the release sync.
//!
//! This module handles loading configuration values from environment variables
//! and `.env` files and turning them into a validated [`SyncConfig`].
//!
//! The configuration system follows a hierarchical approach:
//! 1. Command-line flags (applied by the CLI on top of the loaded config)
//! 2. Environment variables
//! 3. `.env` file in the local data directory
//! 4. Application defaults

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;

use crate::{
    spotify::MAX_PAGE_LIMIT,
    sync::RetryPolicy,
    types::{ArtistSource, ReleaseKinds},
};

pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Directory holding the `.env` file, token and snapshot cache.
///
/// - Linux: `~/.local/share/relsync`
/// - macOS: `~/Library/Application Support/relsync`
/// - Windows: `%LOCALAPPDATA%/relsync`
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("relsync");
    path
}

/// Loads environment variables from `.env` in the local data directory.
///
/// A missing file is fine, variables may come from the process environment
/// alone. Values already present in the environment are never overwritten.
///
/// # Errors
///
/// Fails when the data directory cannot be created or the file exists but
/// cannot be parsed.
pub async fn load_env() -> Result<(), String> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Everything a sync pass can be tuned with.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Collections artists are discovered from.
    pub artist_sources: Vec<ArtistSource>,
    /// Worker pool size, the global bound on in-flight requests.
    pub concurrency: usize,
    /// Whether album details (label, popularity) are fetched after releases.
    pub fetch_extra_data: bool,
    /// Retries per request inside the fetch client.
    ///
    /// Each page resubmission runs the client again, so a page that keeps
    /// failing is attempted `(max_retries + 1) * (page_resubmits + 1)` times.
    pub max_retries: u32,
    /// Fraction of failed artists above which the pass fails.
    pub failure_threshold: f64,
    /// Resubmissions of a page after the client gave up on a retryable error.
    ///
    /// Multiplies with `max_retries`, see there.
    pub page_resubmits: u32,
    /// Page size for list endpoints.
    pub page_limit: u32,
    pub release_types: ReleaseKinds,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Longest server-requested wait honoured before giving up.
    pub max_retry_after: Duration,
    pub request_timeout: Duration,
    pub api_url: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            artist_sources: vec![ArtistSource::Followed],
            concurrency: 10,
            fetch_extra_data: false,
            max_retries: retry.max_retries,
            failure_threshold: 0.5,
            page_resubmits: 1,
            page_limit: MAX_PAGE_LIMIT,
            release_types: ReleaseKinds::default(),
            backoff_base: retry.base_delay,
            backoff_max: retry.max_delay,
            max_retry_after: retry.max_retry_after,
            request_timeout: Duration::from_secs(30),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl SyncConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// config::load_env().await?;
    /// let config = SyncConfig::from_env()?;
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, keeping defaults for unset keys.
    ///
    /// # Recognized Keys
    ///
    /// - `RELSYNC_ARTIST_SOURCES` - comma separated: followed, saved-tracks, saved-albums
    /// - `RELSYNC_CONCURRENCY` - worker count
    /// - `RELSYNC_FETCH_EXTRA_DATA` - true/false
    /// - `RELSYNC_MAX_RETRIES` - retries per request, repeated for every page resubmission
    /// - `RELSYNC_FAILURE_THRESHOLD` - fraction in [0, 1]
    /// - `RELSYNC_PAGE_RESUBMITS` - page resubmissions after exhausted retries
    /// - `RELSYNC_PAGE_LIMIT` - page size, 1 to 50
    /// - `RELSYNC_RELEASE_TYPES` - album, single, compilation, appears_on or all
    /// - `RELSYNC_BACKOFF_BASE_MS`, `RELSYNC_BACKOFF_MAX_MS` - backoff bounds
    /// - `RELSYNC_MAX_RETRY_AFTER_SECS` - Retry-After ceiling
    /// - `RELSYNC_REQUEST_TIMEOUT_SECS` - per request timeout
    /// - `SPOTIFY_API_URL` - Web API base URL
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let artist_sources = match lookup("RELSYNC_ARTIST_SOURCES") {
            Some(raw) => parse_sources(&raw).map_err(|reason| ConfigError::InvalidValue {
                key: "RELSYNC_ARTIST_SOURCES".to_string(),
                value: raw.clone(),
                reason,
            })?,
            None => defaults.artist_sources,
        };

        let config = Self {
            artist_sources,
            concurrency: parse_or(&lookup, "RELSYNC_CONCURRENCY", defaults.concurrency)?,
            fetch_extra_data: parse_or(
                &lookup,
                "RELSYNC_FETCH_EXTRA_DATA",
                defaults.fetch_extra_data,
            )?,
            max_retries: parse_or(&lookup, "RELSYNC_MAX_RETRIES", defaults.max_retries)?,
            failure_threshold: parse_or(
                &lookup,
                "RELSYNC_FAILURE_THRESHOLD",
                defaults.failure_threshold,
            )?,
            page_resubmits: parse_or(&lookup, "RELSYNC_PAGE_RESUBMITS", defaults.page_resubmits)?,
            page_limit: parse_or(&lookup, "RELSYNC_PAGE_LIMIT", defaults.page_limit)?,
            release_types: parse_or(&lookup, "RELSYNC_RELEASE_TYPES", defaults.release_types)?,
            backoff_base: Duration::from_millis(parse_or(
                &lookup,
                "RELSYNC_BACKOFF_BASE_MS",
                defaults.backoff_base.as_millis() as u64,
            )?),
            backoff_max: Duration::from_millis(parse_or(
                &lookup,
                "RELSYNC_BACKOFF_MAX_MS",
                defaults.backoff_max.as_millis() as u64,
            )?),
            max_retry_after: Duration::from_secs(parse_or(
                &lookup,
                "RELSYNC_MAX_RETRY_AFTER_SECS",
                defaults.max_retry_after.as_secs(),
            )?),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "RELSYNC_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            api_url: lookup("SPOTIFY_API_URL").unwrap_or(defaults.api_url),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks the constraints a sync pass relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.artist_sources.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one artist source is required".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be a positive integer".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "max_retries must be a positive integer".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.failure_threshold) {
            return Err(ConfigError::Invalid(format!(
                "failure_threshold must be within [0, 1], got {}",
                self.failure_threshold
            )));
        }
        if self.page_limit == 0 || self.page_limit > MAX_PAGE_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "page_limit must be within 1..={}, got {}",
                MAX_PAGE_LIMIT, self.page_limit
            )));
        }
        if self.release_types.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one release type is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.backoff_base,
            max_delay: self.backoff_max,
            max_retry_after: self.max_retry_after,
        }
    }
}

/// Parses a comma separated list of artist sources, dropping duplicates.
pub fn parse_sources(raw: &str) -> Result<Vec<ArtistSource>, String> {
    let mut sources = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let source = part.parse::<ArtistSource>()?;
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    Ok(sources)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}
