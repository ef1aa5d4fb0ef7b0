//! Structured logging infrastructure for Questline.
//!
//! This module provides centralized logging initialization with support
//! for structured JSON output and environment-based configuration.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize the logging system with structured output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level.
///
/// # Example
/// ```no_run
/// use questline_core::logging;
///
/// logging::init();
/// tracing::info!("Mission runtime started");
/// ```
pub fn init() {
    init_with(&LoggingConfig::default());
}

/// Initialize the logging system with JSON output for production environments.
///
/// # Example
/// ```no_run
/// use questline_core::logging;
///
/// logging::init_json();
/// tracing::info!(mission_id = "intro", "Mission started");
/// ```
pub fn init_json() {
    init_with(&LoggingConfig {
        json: true,
        ..LoggingConfig::default()
    });
}

/// Initialize the logging system from configuration.
///
/// `RUST_LOG` takes precedence over `config.level`. Calling this more than once is
/// harmless: later calls leave the first subscriber in place.
pub fn init_with(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
