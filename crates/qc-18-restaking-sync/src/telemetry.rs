//! Logging setup for hosts embedding the service.

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Filter directive could not be parsed.
    #[error("invalid log filter {0:?}")]
    InvalidFilter(String),
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset (e.g. `info`, `qc_18_restaking_sync=debug`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Read `LOG_LEVEL` and `JSON_LOGS` from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            level: env::var("LOG_LEVEL").unwrap_or(defaults.level),
            json: env::var("JSON_LOGS")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(defaults.json),
        }
    }
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|_| LoggingError::InvalidFilter(config.level.clone()))?;

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };
    Ok(installed.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(!init_logging(&config).unwrap());
    }
}
