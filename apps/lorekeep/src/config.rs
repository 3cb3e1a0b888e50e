//! # Configuration
//!
//! `lorekeep.toml` plus environment overrides.
//!
//! ```toml
//! [registry]
//! path = "lorekeep.lore"
//!
//! [history]
//! limit = 256
//!
//! [sync]
//! endpoint = "https://example.invalid/ops"
//! api_key = "..."
//! timeout_ms = 5000
//!
//! [log]
//! format = "text"
//! ```
//!
//! Every section is optional. `LOREKEEP_SYNC_URL`, `LOREKEEP_API_KEY` and
//! `LOREKEEP_LOG_FORMAT` override the file.

use lorekeep_core::primitives::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "lorekeep.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub history: HistoryConfig,
    pub sync: SyncConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `lorekeep.toml` if present, else defaults;
    /// then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Config::default(),
        };
        let config = config.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-style overrides from `lookup`.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("LOREKEEP_SYNC_URL") {
            self.sync.endpoint = Some(url);
        }
        if let Some(key) = lookup("LOREKEEP_API_KEY") {
            self.sync.api_key = Some(key);
        }
        if let Some(format) = lookup("LOREKEEP_LOG_FORMAT") {
            self.log.format = format;
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.timeout_ms == 0 {
            return Err(ConfigError::Invalid("sync.timeout_ms must be > 0".to_string()));
        }
        if let Some(endpoint) = &self.sync.endpoint
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "sync.endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }
        if self.log.json().is_none() {
            return Err(ConfigError::Invalid(format!(
                "log.format must be 'text' or 'json', got '{}'",
                self.log.format
            )));
        }
        Ok(())
    }
}

/// Registry file location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("lorekeep.lore"),
        }
    }
}

/// Undo history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum undo depth; 0 keeps everything.
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Remote operation sink. Disabled without an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Per-request timeout, also the exit drain budget.
    pub timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_ms: 5000,
        }
    }
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `text` or `json`.
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
        }
    }
}

impl LogConfig {
    /// `Some(true)` for JSON output, `None` for an unknown format.
    #[must_use]
    pub fn json(&self) -> Option<bool> {
        match self.format.as_str() {
            "json" => Some(true),
            "text" => Some(false),
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
