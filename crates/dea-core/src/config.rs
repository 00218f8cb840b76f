//! Pool daemon configuration parser (TOML).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Advertisement TTL used when the config does not set one.
pub const DEFAULT_ADVERTISEMENT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Seconds an advertisement stays live after receipt.
    #[serde(default = "default_advertisement_timeout")]
    pub advertisement_timeout_in_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            advertisement_timeout_in_seconds: DEFAULT_ADVERTISEMENT_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    pub fn with_timeout_secs(secs: u64) -> Self {
        Self {
            advertisement_timeout_in_seconds: secs,
        }
    }

    pub fn advertisement_ttl(&self) -> Duration {
        Duration::from_secs(self.advertisement_timeout_in_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_advertisement_timeout() -> u64 {
    DEFAULT_ADVERTISEMENT_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
