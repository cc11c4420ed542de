//! Configuration for the price-series entity and the fundamentals client.
//!
//! `StonkConfig` is read from a TOML file; every field has a default so an
//! empty file is valid. `FundamentalsConfig` comes from the environment
//! (`.env` is honoured) because it carries the API key.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::stooq::DEFAULT_BASE_URL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing setting: {0}")]
    Missing(String),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Settings for quote retrieval and the local archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StonkConfig {
    /// Root of the local flat-file archive.
    pub archive_root: PathBuf,
    /// Formatted ticker index (`TICKER,COUNTRY,EXCHANGE,FILEPATH`).
    pub ticker_index: PathBuf,
    /// Last day the archive holds data for. Without it the archive is never consulted.
    pub archive_updated: Option<NaiveDate>,
    pub quote_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for StonkConfig {
    fn default() -> Self {
        Self {
            archive_root: PathBuf::from("data/stooq/"),
            ticker_index: PathBuf::from("data/stooq/filepathsformatted.txt"),
            archive_updated: None,
            quote_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl StonkConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if self.quote_base_url.trim().is_empty() {
            return Err(ConfigError::Missing("quote_base_url".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub const DEFAULT_FUNDAMENTALS_URL: &str = "https://eodhd.com";
pub const DEFAULT_DAILY_LIMIT: u32 = 19;

/// Settings for the quota-gated fundamentals client.
#[derive(Debug, Clone, PartialEq)]
pub struct FundamentalsConfig {
    pub api_key: String,
    pub daily_limit: u32,
    pub log_directory: PathBuf,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl FundamentalsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            daily_limit: DEFAULT_DAILY_LIMIT,
            log_directory: PathBuf::from("logs"),
            base_url: DEFAULT_FUNDAMENTALS_URL.to_string(),
            timeout_secs: 10,
        }
    }

    /// Read `EODHD_API_KEY` and `EODHD_DAILY_LIMIT`, loading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var("EODHD_API_KEY")
            .map_err(|_| ConfigError::Missing("EODHD_API_KEY".into()))?;

        let daily_limit = match std::env::var("EODHD_DAILY_LIMIT") {
            Ok(raw) => raw.trim().parse::<u32>().map_err(|_| {
                ConfigError::Invalid(format!("EODHD_DAILY_LIMIT must be an integer, got '{raw}'"))
            })?,
            Err(_) => DEFAULT_DAILY_LIMIT,
        };

        Ok(Self {
            daily_limit,
            ..Self::new(api_key)
        })
    }

    pub fn with_log_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_directory = dir.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_daily_limit(mut self, limit: u32) -> Self {
        self.daily_limit = limit;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
