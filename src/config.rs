//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a default, so a missing file yields the stock
//! configuration and the binary needs no arguments to run.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::types::WatchError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub selection: SelectionConfig,
    pub storage: StorageConfig,
    pub retention: RetentionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "https://www.coinglass.com/zh".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SelectionConfig {
    /// Open interest must be strictly above this (USD).
    pub min_open_interest: f64,
    /// 24h volume must be strictly above this (USD).
    pub min_volume_24h: f64,
    pub top_n: usize,
    /// 1h OI change (%) an asset must exceed to be in an episode.
    pub momentum_threshold: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_open_interest: 10_000_000.0,
            min_volume_24h: 20_000_000.0,
            top_n: 20,
            momentum_threshold: 5.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "data.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RetentionConfig {
    /// Keep at most this many records per symbol. `None` keeps everything.
    pub max_records_per_symbol: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string, e.g. `"oi_watch=debug"`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "oi_watch=info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), WatchError> {
        if self.source.url.trim().is_empty() {
            return Err(WatchError::Config("source.url must not be empty".into()));
        }
        if self.source.timeout_secs == 0 {
            return Err(WatchError::Config("source.timeout_secs must be positive".into()));
        }
        if self.selection.top_n == 0 {
            return Err(WatchError::Config("selection.top_n must be positive".into()));
        }
        if self.storage.path.trim().is_empty() {
            return Err(WatchError::Config("storage.path must not be empty".into()));
        }
        if self.retention.max_records_per_symbol == Some(0) {
            return Err(WatchError::Config(
                "retention.max_records_per_symbol must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
