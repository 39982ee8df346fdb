//! Bootstrap error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::loader::MountError;

/// Errors that end the bootstrap sequence.
#[derive(Debug, Error)]
pub enum BootError {
    /// A container the game cannot start without was not found.
    #[error("required container {name} is missing: {reason}")]
    MissingRequiredContainer { name: String, reason: String },

    /// The user declined to select a replacement file.
    #[error("bootstrap cancelled by user")]
    Cancelled,

    /// A user-selected file could not be copied into the install directory.
    #[error("failed to install {} as {}: {source}", from.display(), to.display())]
    Install {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A located container could not be mounted.
    #[error("mount failed for {}: {source}", path.display())]
    Mount {
        path: PathBuf,
        #[source]
        source: MountError,
    },
}

impl BootError {
    /// Whether the process should exit with a failure status.
    ///
    /// Only a user cancel is a clean exit.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BootError::Cancelled)
    }
}
