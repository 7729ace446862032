//! # Structured Logging
//!
//! Environment-aware tracing setup. `RUST_LOG` wins when set, then
//! `logging.level` from configuration, then a default picked from the
//! environment name.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the global subscriber once per process
pub fn init_structured_logging(config: &LoggingConfig, environment: &str) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let directive = log_directive(config, environment);
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(filter)
                .boxed()
        };

        // Another subscriber (a test harness, usually) may already be installed
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            environment = %environment,
            default_directive = %directive,
            json = config.json,
            "Structured logging initialized"
        );
    });
}

/// Filter directive to use when `RUST_LOG` is unset
fn log_directive(config: &LoggingConfig, environment: &str) -> String {
    config
        .level
        .as_deref()
        .map(str::trim)
        .filter(|level| !level.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_level(environment).to_string())
}

fn default_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_by_environment() {
        assert_eq!(default_level("production"), "info");
        assert_eq!(default_level("development"), "debug");
        assert_eq!(default_level("test"), "debug");
        assert_eq!(default_level("staging"), "debug");
    }

    #[test]
    fn test_configured_level_wins() {
        let config = LoggingConfig {
            level: Some("warn,lims_workflow=debug".to_string()),
            json: false,
        };
        assert_eq!(log_directive(&config, "production"), "warn,lims_workflow=debug");

        let blank = LoggingConfig {
            level: Some("  ".to_string()),
            json: true,
        };
        assert_eq!(log_directive(&blank, "production"), "info");
    }
}
