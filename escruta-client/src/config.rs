//! Configuration loading for the ESCRUTA field client.
//!
//! The server URL, auth token, and queue path are required. The `[queue]`
//! and `[sync]` tables fall back to the policy defaults when omitted.

use escruta_core::{QueueConfig, SyncConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the ESCRUTA API, e.g. `https://api.escruta.example.org`.
    pub api_base_url: String,
    /// Bearer token identifying this reporter.
    pub auth_token: String,
    /// File the offline queue persists to between runs.
    pub queue_path: PathBuf,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or ESCRUTA_CLIENT_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.auth_token.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "auth_token",
                reason: "must not be empty".to_string(),
            });
        }
        if self.queue_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "queue_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.queue.max_items == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue.max_items",
                reason: "must be > 0".to_string(),
            });
        }
        self.sync.validate().map_err(|e| ConfigError::InvalidValue {
            field: "sync",
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("ESCRUTA_CLIENT_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
