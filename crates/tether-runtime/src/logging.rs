//! Logging setup
//!
//! The runtime emits `tracing` events under the `tether_runtime` target:
//! `debug` when functions are adapted and modules load, `trace` per call,
//! `warn` when a result cannot be encoded. Hosts that have no subscriber of
//! their own can install one from the `[logging]` config section.

use tether_config::{LogFormat, LoggingConfig};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Failure to install the global subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

/// Build the filter from config directives
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(config.filter()).map_err(|e| LoggingError::InvalidFilter {
        filter: config.filter().to_string(),
        reason: e.to_string(),
    })
}

/// Install a global fmt subscriber writing to stderr
///
/// Fails if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = match config.format() {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| LoggingError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_directives() {
        let config = LoggingConfig {
            filter: Some("tether_runtime=debug,warn".to_string()),
            format: None,
        };
        assert!(build_filter(&config).is_ok());
    }

    #[test]
    fn test_build_filter_rejects_garbage() {
        let config = LoggingConfig {
            filter: Some("tether_runtime=notalevel".to_string()),
            format: None,
        };
        assert!(matches!(
            build_filter(&config),
            Err(LoggingError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig {
            filter: Some("off".to_string()),
            format: Some(LogFormat::Compact),
        };
        // Another test may have installed a subscriber first
        let _ = init(&config);
        assert!(matches!(init(&config), Err(LoggingError::Init(_))));
    }
}
