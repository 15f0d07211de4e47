//! Logging setup for binaries embedding the tracker.

use thiserror::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogConfig, LogFormat};

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Failed to install log bridge: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// `RUST_LOG` when set, otherwise `level`.
pub fn build_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| TelemetryError::Filter {
        filter: level.to_string(),
        reason: e.to_string(),
    })
}

/// Installs the global subscriber and routes `log` records into it.
///
/// Can only succeed once per process.
pub fn init_logging(config: &LogConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(&config.level)?;

    tracing_log::LogTracer::init()?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Text => {
            let layer = fmt::layer().with_target(true).with_thread_ids(true);
            tracing::subscriber::set_global_default(registry.with(layer))?;
        }
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false);
            tracing::subscriber::set_global_default(registry.with(layer))?;
        }
    }

    log::debug!("Logging initialised ({:?}, '{}')", config.format, config.level);
    Ok(())
}
