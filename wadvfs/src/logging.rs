//! Logging setup.
//!
//! Installs a `tracing` subscriber with:
//!
//! - an `EnvFilter` taken from `RUST_LOG`, or the configured level
//! - a human-readable layer on stderr
//! - an optional plain-text file layer under the configured directory
//!
//! Keep the returned [`LoggingGuard`] alive for the whole program; dropping
//! it flushes the file writer.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Name of the log file inside the log directory.
pub const LOG_FILE_NAME: &str = "wadvfs.log";

/// Errors from installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    /// The log directory could not be created.
    #[error("cannot create log directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Keeps the file writer alive. Flushes on drop.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
    log_file: Option<PathBuf>,
}

impl LoggingGuard {
    /// Path of the log file, when file logging is enabled.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if the filter is invalid, the log directory cannot be created or a
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(env.as_deref(), &config.level)?;

    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    let (file_layer, file_guard, log_file) = match &config.directory {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard), Some(dir.join(LOG_FILE_NAME)))
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_file,
    })
}

/// Filter from the environment value when set, else from `level`.
fn build_filter(env: Option<&str>, level: &str) -> Result<EnvFilter, LoggingError> {
    let directive = env
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(level);
    EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_level() {
        let filter = build_filter(None, "debug").unwrap();
        assert!(filter.to_string().contains("debug"));
    }

    #[test]
    fn test_env_overrides_level() {
        let filter = build_filter(Some("wadvfs=trace"), "info").unwrap();
        assert!(filter.to_string().contains("wadvfs=trace"));
    }

    #[test]
    fn test_blank_env_falls_back() {
        let filter = build_filter(Some("  "), "warn").unwrap();
        assert!(filter.to_string().contains("warn"));
    }
}
