//! Merged namespace over all mounted devices.
//!
//! The merge engine walks a [`DeviceStore`](crate::store::DeviceStore) in
//! mount order and produces a [`Namespace`]: one flat table mapping every
//! logical name to the device that supplies it.
//!
//! # Precedence
//!
//! ```text
//! mount order:   doom64.rom   →   doom64ex.pk3   →   user.pk3
//!                (lowest)                            (highest)
//!
//! "playpal" in rom and user.pk3  ⇒  resolves to user.pk3
//! ```
//!
//! A later mount always wins. There is no per-entry precedence: timestamps,
//! sizes and formats play no part.
//!
//! # Staleness
//!
//! A namespace is a snapshot. Mounting or removing devices afterwards does
//! not change it; [`Namespace::is_stale`] reports when the store has moved on
//! and the caller should merge again.

mod index;
mod merge;

pub use index::{Namespace, NamespaceDevice, Resolution};
pub use merge::merge;

use thiserror::Error;

use crate::device::ReadError;

/// Errors from namespace lookups.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No mounted device supplies the name.
    #[error("'{0}' not found in namespace")]
    NotFound(String),

    /// The owning device failed to read the entry.
    #[error("failed to read '{name}': {source}")]
    Read {
        name: String,
        #[source]
        source: ReadError,
    },
}

impl LookupError {
    /// Whether this is a plain missing-name result.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound(_))
    }
}
