//! Logging setup

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

const DEFAULT_LEVEL: &str = "info";

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`. Fails with a config
/// error when a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = if config.log_level.is_empty() {
        DEFAULT_LEVEL
    } else {
        &config.log_level
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::config(format!("Failed to install log subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig {
            log_level: "warn".to_string(),
            json_logs: false,
        };
        // Another test may have installed the subscriber first
        let _ = init_logging(&config);
        let err = init_logging(&config).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.log_level.is_empty());
        assert!(!config.json_logs);
    }
}
