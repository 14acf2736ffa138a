//! # Observability
//!
//! Installs the global `tracing` subscriber for test binaries that drive
//! the fixture lifecycle themselves (`harness = false` targets).
//!
//! The subscriber is `registry + EnvFilter + fmt`, the same stack the CLI
//! binaries use, configured from [`config::LogConfig`].

use config::LogConfig;
use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// Build the `EnvFilter` described by `config`.
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter, TracingError> {
    EnvFilter::try_new(&config.filter).map_err(|e| TracingError::InvalidFilter {
        filter: config.filter.clone(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber.
///
/// Returns `Ok(true)` when this call installed it and `Ok(false)` when a
/// global subscriber was already set, so calling it from several harness
/// entrypoints in one process is harmless.
pub fn init_tracing(config: &LogConfig) -> Result<bool, TracingError> {
    let filter = env_filter(config)?;
    let writer = if config.test_writer {
        BoxMakeWriter::new(fmt::TestWriter::new())
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(config.ansi).with_writer(writer))
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter = %config.filter, "tracing initialized");
    }
    Ok(installed)
}
