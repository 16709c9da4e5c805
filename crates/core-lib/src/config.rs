// ============================
// crates/core-lib/src/config.rs
// ============================
//! Configuration management.
use std::path::{Path, PathBuf};

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::auth::password::{HashCost, MAX_LOG_N, MIN_LOG_N};
use crate::error::AppError;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "microfeed.toml";

/// Prefix for environment overrides, e.g. `MICROFEED_FEED__PAGE_SIZE=50`
pub const ENV_PREFIX: &str = "MICROFEED_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the flat-file store
    pub data_dir: PathBuf,
    /// Log level
    pub log_level: String,
    /// Password and remember-token settings
    pub credentials: CredentialSettings,
    /// Feed settings
    pub feed: FeedSettings,
}

/// Password hashing and remember-token settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    /// Use the cheapest hash cost (test and development environments)
    pub min_cost: bool,
    /// Explicit scrypt `log_n`; wins over `min_cost` when set
    pub cost_log_n: Option<u8>,
    /// Random bytes per remember, activation or reset token
    #[serde(alias = "remember_token_bytes")]
    pub token_bytes: usize,
}

/// Feed settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Items fetched per page when streaming a feed
    pub page_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
            credentials: CredentialSettings::default(),
            feed: FeedSettings::default(),
        }
    }
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            min_cost: false,
            cost_log_n: None,
            token_bytes: 32,
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self { page_size: 30 }
    }
}

impl CredentialSettings {
    /// Resolve the hash cost these settings ask for
    pub fn hash_cost(&self) -> HashCost {
        match self.cost_log_n {
            Some(log_n) => HashCost::LogN(log_n),
            None if self.min_cost => HashCost::Minimum,
            None => HashCost::Recommended,
        }
    }
}

impl Settings {
    /// Layered sources: defaults, then `path`, then `MICROFEED_*` env vars
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load settings from `microfeed.toml` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load settings from a specific file and the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let settings: Settings = Self::figment(path).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would make the core misbehave
    pub fn validate(&self) -> Result<(), AppError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }

        if let Some(log_n) = self.credentials.cost_log_n {
            if !(MIN_LOG_N..=MAX_LOG_N).contains(&log_n) {
                return Err(AppError::Config(format!(
                    "cost_log_n must be between {MIN_LOG_N} and {MAX_LOG_N}"
                )));
            }
        }

        if self.credentials.token_bytes < 16 {
            return Err(AppError::Config(
                "token_bytes must be at least 16".to_string(),
            ));
        }

        if self.feed.page_size == 0 {
            return Err(AppError::Config("feed page_size must be positive".to_string()));
        }

        Ok(())
    }
}
