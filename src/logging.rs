//! # Structured Logging Module
//!
//! Environment-aware structured logging. Console output always; an optional
//! JSON file per process for post-mortem analysis of startup ordering.

use crate::config::LoggingConfig;
use chrono::Utc;
use std::fs;
use std::process;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

static LOGGER_INITIALIZED: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Initialize structured logging from the `[logging]` config section.
///
/// Safe to call more than once; only the first call has any effect. If a
/// global subscriber already exists (a host or test installed one), it is left
/// in place.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let level = config.level.clone();
        let console = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_level(true)
            .with_filter(EnvFilter::new(level.clone()));

        let (file_layer, guard, log_path) = if config.json_file {
            match fs::create_dir_all(&config.directory) {
                Ok(()) => {
                    let filename = format!("lintbridge.{}.{}.log", process::id(), Utc::now().format("%Y%m%d_%H%M%S"));
                    let appender = tracing_appender::rolling::never(&config.directory, &filename);
                    let (writer, guard) = tracing_appender::non_blocking(appender);
                    let layer = fmt::layer()
                        .with_writer(writer)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(EnvFilter::new(level));
                    (Some(layer), Some(guard), Some(config.directory.join(filename)))
                }
                Err(e) => {
                    eprintln!("Failed to create log directory {}: {e}", config.directory.display());
                    (None, None, None)
                }
            }
        } else {
            (None, None, None)
        };

        if tracing_subscriber::registry()
            .with(console)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = process::id(),
            level = %config.level,
            log_file = ?log_path,
            "🔧 STRUCTURED LOGGING: Initialized"
        );

        guard
    });
}

/// Log a lifecycle transition of a component initializer
pub fn log_initialization_event(
    owner: &str,
    initializer_id: Uuid,
    operation: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::debug!(
        owner = %owner,
        initializer_id = %initializer_id,
        operation = %operation,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🧩 INITIALIZATION"
    );
}

/// Log a component-level event such as a host notification or outward event
pub fn log_component_event(component: &str, event: &str, status: &str, details: Option<&str>) {
    tracing::debug!(
        component = %component,
        event = %event,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📡 COMPONENT_EVENT"
    );
}
