//! # Logging Setup
//!
//! Installs the `tracing` subscriber: stdout always, plus a named log file
//! when `[logging] directory` is set. Records carry the sink name as their
//! target (`transceiver`, `poller`, `station`).

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{FieldlinkError, Result};

/// Build the level filter: `RUST_LOG` directives plus the configured level
fn build_filter(level: &str) -> Result<EnvFilter> {
    let level: Level = level
        .parse()
        .map_err(|_| FieldlinkError::Config(format!("unknown log level '{}'", level)))?;

    Ok(EnvFilter::from_default_env().add_directive(level.into()))
}

/// Open the log file `directory/file_name` (appending, never rotated)
fn file_appender(directory: &str, file_name: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .map_err(|e| FieldlinkError::Config(format!("cannot open log file in {}: {}", directory, e)))
}

/// Install the global subscriber
///
/// # Returns
///
/// The file writer's guard when a log file is configured. Keep it alive for
/// the life of the process or buffered records are lost.
///
/// # Errors
///
/// Returns `Config` if the level is invalid, the log file cannot be
/// created, or a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(&config.level)?;
    let stdout = tracing_subscriber::fmt::layer();

    match &config.directory {
        Some(directory) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(directory, &config.file_name)?);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(filter)
                .with(stdout)
                .with(file)
                .try_init()
                .map_err(|e| FieldlinkError::Config(format!("logging already initialised: {}", e)))?;

            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stdout)
                .try_init()
                .map_err(|e| FieldlinkError::Config(format!("logging already initialised: {}", e)))?;

            Ok(None)
        }
    }
}
