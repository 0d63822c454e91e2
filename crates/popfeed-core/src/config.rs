use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::item::AuthorId;

/// Environment variable consulted when `source.bearer_token` is not set in the file.
pub const BEARER_TOKEN_ENV: &str = "POPFEED_BEARER_TOKEN";

/// Configuration problems that must stop the process before any job starts.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("language_key is missing or empty")]
    MissingLanguageKey,
    #[error("language_key {0:?} is not a valid language code")]
    InvalidLanguageKey(String),
    #[error("capacity must be at least 1")]
    ZeroCapacity,
    #[error("{0} must be greater than zero")]
    ZeroPeriod(&'static str),
    #[error("no bearer token configured (set source.bearer_token or {BEARER_TOKEN_ENV})")]
    MissingBearerToken,
}

/// Search/lookup API endpoint settings (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the v1.1-style API, without trailing slash.
    pub base_url: String,
    /// Bearer token sent with every request. Falls back to `POPFEED_BEARER_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    /// Results requested per search page.
    pub page_size: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twitter.com/1.1".to_string(),
            bearer_token: None,
            page_size: 100,
            timeout_secs: 30,
        }
    }
}

impl SourceConfig {
    /// Token from the file, or from the environment when the file has none.
    pub fn resolve_bearer_token(&self) -> Result<String, ConfigError> {
        self.bearer_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var(BEARER_TOKEN_ENV).ok())
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingBearerToken)
    }
}

/// Global configuration loaded from `~/.config/popfeed/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopfeedConfig {
    /// Search language filter, e.g. "tr" or "en". Required.
    #[serde(default)]
    pub language_key: String,
    /// Maximum number of items kept in the score cache.
    pub capacity: usize,
    /// Items not refreshed for longer than this are looked up again before eviction.
    pub stale_after_mins: u64,
    /// Delay between the end of one fetch tick and the start of the next.
    pub fetch_period_secs: u64,
    /// Delay between sync ticks.
    pub sync_period_secs: u64,
    /// Delay before the first sync tick.
    pub sync_initial_delay_secs: u64,
    /// Items with fewer interactions than this are never considered.
    #[serde(default)]
    pub min_score: u64,
    /// Authors whose posts are always skipped.
    #[serde(default)]
    pub ignored_authors: Vec<AuthorId>,
    /// Posts containing any of these words (case-insensitive) are skipped.
    #[serde(default)]
    pub ignored_words: Vec<String>,
    #[serde(default)]
    pub source: SourceConfig,
}

impl Default for PopfeedConfig {
    fn default() -> Self {
        Self {
            language_key: String::new(),
            capacity: 30,
            stale_after_mins: 15,
            fetch_period_secs: 60,
            sync_period_secs: 30 * 60,
            sync_initial_delay_secs: 10 * 60,
            min_score: 0,
            ignored_authors: Vec::new(),
            ignored_words: Vec::new(),
            source: SourceConfig::default(),
        }
    }
}

impl PopfeedConfig {
    /// Check everything the runtime needs before it starts any job.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lang = self.language_key.trim();
        if lang.is_empty() {
            return Err(ConfigError::MissingLanguageKey);
        }
        let valid = (2..=3).contains(&lang.len()) && lang.chars().all(|c| c.is_ascii_lowercase());
        if !valid {
            return Err(ConfigError::InvalidLanguageKey(self.language_key.clone()));
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.fetch_period_secs == 0 {
            return Err(ConfigError::ZeroPeriod("fetch_period_secs"));
        }
        if self.sync_period_secs == 0 {
            return Err(ConfigError::ZeroPeriod("sync_period_secs"));
        }
        Ok(())
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_mins.saturating_mul(60))
    }

    pub fn fetch_period(&self) -> Duration {
        Duration::from_secs(self.fetch_period_secs)
    }

    pub fn sync_period(&self) -> Duration {
        Duration::from_secs(self.sync_period_secs)
    }

    pub fn sync_initial_delay(&self) -> Duration {
        Duration::from_secs(self.sync_initial_delay_secs)
    }

    /// TOML rendering with the bearer token masked, for display.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.source.bearer_token.is_some() {
            shown.source.bearer_token = Some("<redacted>".to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("popfeed")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
///
/// The default file has an empty `language_key`, so a freshly created config
/// fails `validate()` until the operator fills it in.
pub fn load_or_init() -> Result<PopfeedConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PopfeedConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PopfeedConfig = toml::from_str(&data)?;
    Ok(cfg)
}
