//! # Logging Setup
//!
//! Structured logging configuration built on `tracing-subscriber`.
//!
//! Hosts that already install their own subscriber can skip this entirely;
//! the crate only emits `tracing` events and never requires a particular
//! subscriber.

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initialize the global tracing subscriber from configuration.
///
/// Respects `RUST_LOG` when set, falling back to the configured level.
/// Returns quietly if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) {
    if !config.log_to_console {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    let installed = if config.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if installed.is_ok() {
        info!(app = config.app_name.as_str(), "logging initialized");
    }
}
