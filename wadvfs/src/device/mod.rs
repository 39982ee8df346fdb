//! Opened containers and the entries they expose.
//!
//! A [`Device`] is the runtime result of a successful loader probe. It owns
//! the underlying resource (file handle or in-memory image) for its whole
//! lifetime and exposes a fixed list of [`Entry`] records, each pairing a
//! logical name with a [`Locator`] the device knows how to read.
//!
//! Entry lists are built once at mount time, so listing a device is cheap,
//! restartable and always returns the same entries.

mod name;

pub use name::{dedup_last_wins, normalize_name};

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque reference to an entry's bytes inside its owning device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locator {
    /// Byte range inside the container.
    Span {
        /// Absolute offset from the start of the container.
        offset: u64,
        /// Length in bytes.
        length: u64,
    },

    /// Index into the device's own table (archive members).
    Index(usize),
}

impl Locator {
    /// Create a span locator.
    pub fn span(offset: u64, length: u64) -> Self {
        Locator::Span { offset, length }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Span { offset, length } => write!(f, "@{:#x}+{}", offset, length),
            Locator::Index(index) => write!(f, "#{}", index),
        }
    }
}

/// A named entry inside one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Normalized logical name, unique within the device.
    pub name: String,

    /// Where the bytes live inside the device.
    pub locator: Locator,

    /// Stored size in bytes (uncompressed for archive members).
    pub size: u64,
}

impl Entry {
    /// Create a new entry. The name is normalized.
    pub fn new(name: &str, locator: Locator, size: u64) -> Self {
        Self {
            name: normalize_name(name),
            locator,
            size,
        }
    }
}

/// Errors from reading a single entry.
///
/// A read error is scoped to the one call that produced it; the device stays
/// mounted and other entries remain readable.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The underlying I/O failed.
    #[error("I/O error reading {device}: {source}")]
    Io {
        device: String,
        #[source]
        source: std::io::Error,
    },

    /// The container ended before the entry did.
    #[error("{device} is truncated: wanted {length} bytes at offset {offset}")]
    Truncated {
        device: String,
        offset: u64,
        length: u64,
    },

    /// The archive reader rejected the member.
    #[error("archive error reading {device}: {reason}")]
    Archive { device: String, reason: String },

    /// The locator does not belong to this device.
    #[error("locator {locator} is not valid for {device}")]
    InvalidLocator { device: String, locator: Locator },

    /// The device was removed from the store after the namespace was built.
    #[error("device {0} has been unmounted")]
    DeviceUnmounted(String),
}

/// An opened, format-recognized container.
///
/// Implementations must be safe to share between threads: reads after merge
/// may come from several threads at once. Each implementation documents how
/// it serializes access to its resource.
pub trait Device: Send + Sync + fmt::Debug {
    /// Short display label, usually the container's file name.
    fn label(&self) -> &str;

    /// Name of the format that opened this device (e.g. "pk3").
    fn format(&self) -> &'static str;

    /// Host path the device was opened from.
    fn path(&self) -> &Path;

    /// All entries, in container order.
    fn list(&self) -> &[Entry];

    /// Read the bytes behind a locator previously returned by [`Device::list`].
    fn read(&self, locator: &Locator) -> Result<Bytes, ReadError>;

    /// Find an entry by logical name.
    fn entry(&self, name: &str) -> Option<&Entry> {
        let name = normalize_name(name);
        self.list().iter().find(|e| e.name == name)
    }
}

/// Derive a device label from its host path.
pub fn label_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Location and label shared by the concrete devices.
#[derive(Debug, Clone)]
pub(crate) struct DeviceOrigin {
    pub label: String,
    pub path: PathBuf,
}

impl DeviceOrigin {
    pub fn new(path: &Path) -> Self {
        Self {
            label: label_for(path),
            path: path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_new_normalizes_name() {
        let entry = Entry::new("\\Textures\\Wall.PNG", Locator::Index(3), 10);
        assert_eq!(entry.name, "textures/wall.png");
        assert_eq!(entry.locator, Locator::Index(3));
        assert_eq!(entry.size, 10);
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::span(0x40, 12).to_string(), "@0x40+12");
        assert_eq!(Locator::Index(7).to_string(), "#7");
    }

    #[test]
    fn test_label_for_uses_file_name() {
        assert_eq!(label_for(Path::new("/data/doom64.rom")), "doom64.rom");
    }

    #[test]
    fn test_read_error_display() {
        let err = ReadError::Truncated {
            device: "a.wad".to_string(),
            offset: 100,
            length: 8,
        };
        assert!(err.to_string().contains("a.wad"));
        assert!(err.to_string().contains("offset 100"));

        let err = ReadError::DeviceUnmounted("b.pk3".to_string());
        assert_eq!(err.to_string(), "device b.pk3 has been unmounted");
    }
}
