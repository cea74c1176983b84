//! Configuration loading module
//!
//! Typed JSON configuration with environment-variable path resolution and
//! serde-backed defaults. A missing config file is not an error; every
//! field falls back to its default.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("failed to parse config at {path}: {message}")]
    ParseError { path: String, message: String },
}

/// Get the state directory.
/// Priority: PINCER_STATE_DIR > ~/.pincer
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = env::var("PINCER_STATE_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pincer")
}

/// Get the config file path.
/// Priority: PINCER_CONFIG_PATH > PINCER_STATE_DIR/pincer.json > ~/.pincer/pincer.json
pub fn config_path() -> PathBuf {
    if let Ok(path) = env::var("PINCER_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    state_dir().join("pincer.json")
}

/// Logging settings as they appear in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogSettings {
    /// Output format: "plaintext" or "json"
    pub format: String,
    /// Default log level when no env filter is set
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: "plaintext".to_string(),
            level: "info".to_string(),
        }
    }
}

/// Reconnect policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconnectSettings {
    /// Initial backoff delay in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum backoff delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectSettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Directory for inbound file uploads (default: <state_dir>/uploads)
    pub upload_dir: Option<PathBuf>,

    /// Path for the persisted transport credentials
    /// (default: <state_dir>/credentials.json)
    pub credentials_path: Option<PathBuf>,

    /// Logging settings
    pub log: LogSettings,

    /// Reconnect policy settings
    pub reconnect: ReconnectSettings,
}

impl Config {
    /// Load the configuration from the resolved config path.
    ///
    /// A missing file yields the default configuration.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(config_path())
    }

    /// Load the configuration from an explicit path.
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Resolved upload directory.
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(|| state_dir().join("uploads"))
    }

    /// Resolved credentials path.
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(|| state_dir().join("credentials.json"))
    }

    /// Convert log settings into a logging subsystem configuration.
    pub fn log_config(&self) -> crate::logging::LogConfig {
        let format = match self.log.format.as_str() {
            "json" => crate::logging::LogFormat::Json,
            _ => crate::logging::LogFormat::Plaintext,
        };
        let default_level = match self.log.level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        };
        crate::logging::LogConfig {
            format,
            output: crate::logging::LogOutput::Stdout,
            default_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.log.format, "plaintext");
        assert_eq!(config.log.level, "info");
        assert_eq!(config.reconnect.initial_delay_ms, 1_000);
        assert_eq!(config.reconnect.max_delay_ms, 30_000);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("pincer-cfg-{}.json", uuid::Uuid::new_v4()));
        let config = Config::load_from(path).unwrap();
        assert!(config.upload_dir.is_none());
        assert_eq!(config.reconnect.initial_delay_ms, 1_000);
    }

    #[test]
    fn test_load_partial_config() {
        let path = std::env::temp_dir().join(format!("pincer-cfg-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, r#"{"log": {"level": "debug"}, "reconnect": {"maxDelayMs": 5000}}"#)
            .unwrap();
        let config = Config::load_from(path.clone()).unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "plaintext");
        assert_eq!(config.reconnect.max_delay_ms, 5_000);
        assert_eq!(config.reconnect.initial_delay_ms, 1_000);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_load_malformed_config_is_an_error() {
        let path = std::env::temp_dir().join(format!("pincer-cfg-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, "{not json").unwrap();
        let result = Config::load_from(path.clone());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
        let _ = fs::remove_file(path);
    }
}
