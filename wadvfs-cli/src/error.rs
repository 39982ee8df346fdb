//! CLI error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use wadvfs::boot::BootError;
use wadvfs::config::ConfigError;
use wadvfs::logging::LoggingError;
use wadvfs::{LookupError, MountError};

/// Anything a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("{0}")]
    Boot(#[from] BootError),

    #[error("{0}")]
    Mount(#[from] MountError),

    #[error("{0}")]
    Lookup(#[from] LookupError),

    #[error("cannot write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// Process exit status for this error.
    ///
    /// A cancelled bootstrap is a clean exit.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Boot(err) if !err.is_fatal() => 0,
            _ => 1,
        }
    }
}
