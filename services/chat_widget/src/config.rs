//! services/chat_widget/src/config.rs
//!
//! Defines the engine's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use support_chat_core::domain::Language;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the help-desk backend, e.g. `http://localhost:8000/api/v1`.
    pub backend_url: String,
    /// How often the poller checks tracked escalations for operator activity.
    pub poll_interval: Duration,
    /// Directory for the durable client-local state file.
    pub storage_dir: PathBuf,
    /// Language used before the visitor picks one.
    pub default_language: Language,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for
    /// development, but this is skipped in test environments to ensure tests
    /// are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let backend_url = std::env::var("SUPPORT_BACKEND_URL")
            .unwrap_or_else(|_| "http://localhost:8000/api/v1".to_string());

        let poll_interval_str =
            std::env::var("POLL_INTERVAL_SECS").unwrap_or_else(|_| "4".to_string());
        let poll_interval_secs = poll_interval_str.parse::<u64>().map_err(|e| {
            ConfigError::InvalidValue("POLL_INTERVAL_SECS".to_string(), e.to_string())
        })?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "POLL_INTERVAL_SECS".to_string(),
                "must be at least 1 second".to_string(),
            ));
        }

        let storage_dir = std::env::var("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.support_chat"));

        let default_language_str =
            std::env::var("DEFAULT_LANGUAGE").unwrap_or_else(|_| "ru".to_string());
        let default_language = default_language_str
            .parse::<Language>()
            .map_err(|e| ConfigError::InvalidValue("DEFAULT_LANGUAGE".to_string(), e))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            backend_url,
            poll_interval: Duration::from_secs(poll_interval_secs),
            storage_dir,
            default_language,
            log_level,
        })
    }
}
