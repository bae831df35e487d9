use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::client::Timeouts;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/v1/recognition";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Client configuration: defaults, then an optional TOML file, then
/// `FACEWIRE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the recognition API, including `/v1/recognition`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sent as `x-api-key` when set.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Timeout for listing and metadata calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Timeout for register, recognize, search and delete-all.
    #[serde(default = "default_long_timeout_secs")]
    pub long_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_long_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            long_timeout_secs: default_long_timeout_secs(),
        }
    }
}

impl Config {
    /// Defaults overridden by `FACEWIRE_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text)?;
        tracing::debug!(path = %path.display(), "config file loaded");
        Ok(config.with_env())
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var("FACEWIRE_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(key) = std::env::var("FACEWIRE_API_KEY") {
            self.api_key = Some(key).filter(|k| !k.is_empty());
        }
        self.timeout_secs = env_u64("FACEWIRE_TIMEOUT_SECS", self.timeout_secs);
        self.long_timeout_secs = env_u64("FACEWIRE_LONG_TIMEOUT_SECS", self.long_timeout_secs);
        self
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            short: Duration::from_secs(self.timeout_secs),
            long: Duration::from_secs(self.long_timeout_secs),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
