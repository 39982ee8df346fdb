//! Format loaders and the registry that trials them.
//!
//! A [`Loader`] recognizes one container format and opens it as a
//! [`Device`]. The [`LoaderRegistry`] keeps loaders in registration order and
//! tries them one after another when asked to mount a path.
//!
//! # Probe outcomes
//!
//! | Probe result       | Registry behavior                                |
//! |--------------------|--------------------------------------------------|
//! | `Ok(Some(device))` | Mount succeeds with this device                  |
//! | `Ok(None)`         | Not this format; try the next loader silently    |
//! | `Err(Corrupt)`     | Format recognized but broken; stop, report error |
//! | `Err(Io)`          | Format recognized but unreadable; stop, report   |
//!
//! A misdetected format must never hide a real parse error, so once a loader
//! claims a file no other loader gets to look at it.
//!
//! # Example
//!
//! ```ignore
//! use wadvfs::loader::LoaderRegistry;
//!
//! let registry = LoaderRegistry::with_defaults();
//! let device = registry.mount("doom64ex.pk3")?;
//! println!("{} entries", device.list().len());
//! ```

mod archive;
pub(crate) mod rom;
pub(crate) mod wad;

pub use archive::{ArchiveDevice, ArchiveLoader};
pub use rom::{RomByteOrder, RomDevice, RomLoader};
pub use wad::{WadDevice, WadKind, WadLoader};

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::device::Device;

/// Errors a loader reports after it has recognized its format.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The container is structurally invalid.
    #[error("{0}")]
    Corrupt(String),

    /// The container could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from mounting a path through the registry.
#[derive(Debug, Error)]
pub enum MountError {
    /// No registered loader recognized the file.
    #[error("no registered loader recognizes {}", path.display())]
    NoMatchingLoader { path: PathBuf },

    /// A loader recognized the file but could not parse it.
    #[error("{loader} container {} is corrupt: {reason}", path.display())]
    CorruptContainer {
        loader: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// The file could not be opened or read.
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MountError {
    /// Path the failed mount was attempted on.
    pub fn path(&self) -> &Path {
        match self {
            MountError::NoMatchingLoader { path } => path,
            MountError::CorruptContainer { path, .. } => path,
            MountError::Io { path, .. } => path,
        }
    }
}

/// Recognizes and opens one container format.
pub trait Loader: Send + Sync {
    /// Format name, used in logs and errors (e.g. "wad").
    fn name(&self) -> &'static str;

    /// Try to open `path` as this loader's format.
    ///
    /// Returns `Ok(None)` when the file is not in this format. Any error
    /// returned means the format was recognized and opening it failed.
    fn probe(&self, path: &Path) -> Result<Option<Box<dyn Device>>, ProbeError>;
}

/// Ordered collection of loaders. Registration order is trial order.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn Loader>>,
}

impl LoaderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    /// Create a registry with the built-in loaders: pk3, wad, rom.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ArchiveLoader);
        registry.register(WadLoader);
        registry.register(RomLoader);
        registry
    }

    /// Append a loader to the end of the trial order.
    pub fn register(&mut self, loader: impl Loader + 'static) {
        self.register_boxed(Box::new(loader));
    }

    /// Append an already boxed loader.
    pub fn register_boxed(&mut self, loader: Box<dyn Loader>) {
        debug!(loader = loader.name(), position = self.loaders.len(), "Registered loader");
        self.loaders.push(loader);
    }

    /// Names of the registered loaders, in trial order.
    pub fn loader_names(&self) -> Vec<&'static str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    /// Number of registered loaders.
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    /// Whether no loader is registered.
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Open `path` with the first loader that recognizes it.
    pub fn mount(&self, path: impl AsRef<Path>) -> Result<Box<dyn Device>, MountError> {
        let path = path.as_ref();

        let metadata = std::fs::metadata(path).map_err(|source| MountError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(MountError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        for loader in &self.loaders {
            match loader.probe(path) {
                Ok(Some(device)) => {
                    info!(
                        loader = loader.name(),
                        path = %path.display(),
                        entries = device.list().len(),
                        "Mounted container"
                    );
                    return Ok(device);
                }
                Ok(None) => {
                    debug!(loader = loader.name(), path = %path.display(), "Format not recognized");
                }
                Err(ProbeError::Corrupt(reason)) => {
                    return Err(MountError::CorruptContainer {
                        loader: loader.name(),
                        path: path.to_path_buf(),
                        reason,
                    });
                }
                Err(ProbeError::Io(source)) => {
                    return Err(MountError::Io {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        }

        Err(MountError::NoMatchingLoader {
            path: path.to_path_buf(),
        })
    }
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("loaders", &self.loader_names())
            .finish()
    }
}

/// Read up to `len` leading bytes of a file for format sniffing.
///
/// Returns fewer bytes when the file is shorter.
pub(crate) fn read_magic(path: &Path, len: usize) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buf = Vec::with_capacity(len);
    file.take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use bytes::Bytes;
    use tempfile::TempDir;

    use crate::device::{Entry, Locator, ReadError};

    #[derive(Debug)]
    struct StubDevice {
        label: String,
        path: PathBuf,
        entries: Vec<Entry>,
    }

    impl Device for StubDevice {
        fn label(&self) -> &str {
            &self.label
        }
        fn format(&self) -> &'static str {
            "stub"
        }
        fn path(&self) -> &Path {
            &self.path
        }
        fn list(&self) -> &[Entry] {
            &self.entries
        }
        fn read(&self, _locator: &Locator) -> Result<Bytes, ReadError> {
            Ok(Bytes::new())
        }
    }

    /// Loader that never recognizes anything and counts how often it was asked.
    struct NeverLoader {
        calls: Arc<AtomicUsize>,
    }

    impl Loader for NeverLoader {
        fn name(&self) -> &'static str {
            "never"
        }
        fn probe(&self, _path: &Path) -> Result<Option<Box<dyn Device>>, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    /// Loader that always recognizes the file.
    struct AlwaysLoader {
        label: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl Loader for AlwaysLoader {
        fn name(&self) -> &'static str {
            "always"
        }
        fn probe(&self, path: &Path) -> Result<Option<Box<dyn Device>>, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Box::new(StubDevice {
                label: self.label.to_string(),
                path: path.to_path_buf(),
                entries: vec![Entry::new("x", Locator::Index(0), 1)],
            })))
        }
    }

    /// Loader that recognizes the file and reports it corrupt.
    struct CorruptLoader;

    impl Loader for CorruptLoader {
        fn name(&self) -> &'static str {
            "corrupt"
        }
        fn probe(&self, _path: &Path) -> Result<Option<Box<dyn Device>>, ProbeError> {
            Err(ProbeError::Corrupt("bad directory".to_string()))
        }
    }

    fn temp_file(temp: &TempDir) -> PathBuf {
        let path = temp.path().join("data.bin");
        std::fs::write(&path, b"whatever").unwrap();
        path
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn test_empty_registry_has_no_match() {
        let temp = TempDir::new().unwrap();
        let path = temp_file(&temp);

        let registry = LoaderRegistry::new();
        let err = registry.mount(&path).unwrap_err();

        assert!(matches!(err, MountError::NoMatchingLoader { .. }));
        assert_eq!(err.path(), path.as_path());
    }

    #[test]
    fn test_defaults_order() {
        let registry = LoaderRegistry::with_defaults();
        assert_eq!(registry.loader_names(), vec!["pk3", "wad", "rom"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_non_matching_loader_falls_through() {
        let temp = TempDir::new().unwrap();
        let path = temp_file(&temp);
        let never_calls = counter();
        let always_calls = counter();

        let mut registry = LoaderRegistry::new();
        registry.register(NeverLoader {
            calls: Arc::clone(&never_calls),
        });
        registry.register(AlwaysLoader {
            label: "p2",
            calls: Arc::clone(&always_calls),
        });

        let device = registry.mount(&path).unwrap();

        assert_eq!(device.label(), "p2");
        assert_eq!(never_calls.load(Ordering::SeqCst), 1);
        assert_eq!(always_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_match_wins_and_later_loaders_are_not_consulted() {
        let temp = TempDir::new().unwrap();
        let path = temp_file(&temp);
        let never_calls = counter();

        let mut registry = LoaderRegistry::new();
        registry.register(AlwaysLoader {
            label: "first",
            calls: counter(),
        });
        registry.register(NeverLoader {
            calls: Arc::clone(&never_calls),
        });

        let device = registry.mount(&path).unwrap();

        assert_eq!(device.label(), "first");
        assert_eq!(never_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_corrupt_container_stops_trial() {
        let temp = TempDir::new().unwrap();
        let path = temp_file(&temp);
        let fallback_calls = counter();

        let mut registry = LoaderRegistry::new();
        registry.register(CorruptLoader);
        registry.register(AlwaysLoader {
            label: "fallback",
            calls: Arc::clone(&fallback_calls),
        });

        let err = registry.mount(&path).unwrap_err();

        match err {
            MountError::CorruptContainer { loader, reason, .. } => {
                assert_eq!(loader, "corrupt");
                assert_eq!(reason, "bad directory");
            }
            other => panic!("expected CorruptContainer, got {other:?}"),
        }
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let calls = counter();

        let mut registry = LoaderRegistry::new();
        registry.register(AlwaysLoader {
            label: "x",
            calls: Arc::clone(&calls),
        });

        let err = registry.mount(temp.path().join("missing.wad")).unwrap_err();

        assert!(matches!(err, MountError::Io { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_directory_is_io_error() {
        let temp = TempDir::new().unwrap();
        let registry = LoaderRegistry::with_defaults();

        let err = registry.mount(temp.path()).unwrap_err();
        assert!(matches!(err, MountError::Io { .. }));
    }

    #[test]
    fn test_read_magic_short_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tiny");
        std::fs::write(&path, b"PK").unwrap();

        assert_eq!(read_magic(&path, 4).unwrap(), b"PK");
    }

    #[test]
    fn test_mount_error_display() {
        let err = MountError::CorruptContainer {
            loader: "wad",
            path: PathBuf::from("/data/broken.wad"),
            reason: "directory past end of file".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "wad container /data/broken.wad is corrupt: directory past end of file"
        );
    }
}
