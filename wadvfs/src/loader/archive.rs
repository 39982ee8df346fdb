//! ZIP / PK3 archive loader.
//!
//! Member paths become logical names (forward slashes, lowercase). Directory
//! members are skipped. The zip reader keeps a cursor into the file, so
//! reads go through a mutex around the archive.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use bytes::Bytes;
use parking_lot::Mutex;
use zip::result::ZipError;
use zip::ZipArchive;

use super::{read_magic, Loader, ProbeError};
use crate::device::{dedup_last_wins, Device, DeviceOrigin, Entry, Locator, ReadError};

/// Local file header signature.
const LOCAL_HEADER_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// End of central directory signature (an archive with no members).
const EMPTY_ARCHIVE_MAGIC: &[u8; 4] = b"PK\x05\x06";

/// Loader for ZIP archives (`.pk3`, `.zip`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveLoader;

impl Loader for ArchiveLoader {
    fn name(&self) -> &'static str {
        "pk3"
    }

    fn probe(&self, path: &Path) -> Result<Option<Box<dyn Device>>, ProbeError> {
        let magic = read_magic(path, 4)?;
        if magic.as_slice() != LOCAL_HEADER_MAGIC && magic.as_slice() != EMPTY_ARCHIVE_MAGIC {
            return Ok(None);
        }

        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file).map_err(probe_error)?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let member = archive.by_index_raw(index).map_err(probe_error)?;
            if member.is_dir() {
                continue;
            }
            entries.push(Entry::new(member.name(), Locator::Index(index), member.size()));
        }

        Ok(Some(Box::new(ArchiveDevice {
            origin: DeviceOrigin::new(path),
            archive: Mutex::new(archive),
            entries: dedup_last_wins(entries),
        })))
    }
}

fn probe_error(err: ZipError) -> ProbeError {
    match err {
        ZipError::Io(e) => ProbeError::Io(e),
        other => ProbeError::Corrupt(other.to_string()),
    }
}

/// An opened ZIP archive.
pub struct ArchiveDevice {
    origin: DeviceOrigin,
    archive: Mutex<ZipArchive<File>>,
    entries: Vec<Entry>,
}

impl fmt::Debug for ArchiveDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveDevice")
            .field("path", &self.origin.path)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl Device for ArchiveDevice {
    fn label(&self) -> &str {
        &self.origin.label
    }

    fn format(&self) -> &'static str {
        "pk3"
    }

    fn path(&self) -> &Path {
        &self.origin.path
    }

    fn list(&self) -> &[Entry] {
        &self.entries
    }

    fn read(&self, locator: &Locator) -> Result<Bytes, ReadError> {
        let Locator::Index(index) = *locator else {
            return Err(ReadError::InvalidLocator {
                device: self.origin.label.clone(),
                locator: *locator,
            });
        };

        let mut archive = self.archive.lock();
        if index >= archive.len() {
            return Err(ReadError::InvalidLocator {
                device: self.origin.label.clone(),
                locator: *locator,
            });
        }

        let mut member = archive.by_index(index).map_err(|err| match err {
            ZipError::Io(source) => ReadError::Io {
                device: self.origin.label.clone(),
                source,
            },
            other => ReadError::Archive {
                device: self.origin.label.clone(),
                reason: other.to_string(),
            },
        })?;

        let declared = member.size();
        let buf = read_member(&mut member, declared).map_err(|source| ReadError::Io {
            device: self.origin.label.clone(),
            source,
        })?;

        Ok(Bytes::from(buf))
    }
}

/// Upper bound on the buffer reserved from a member's declared size.
const MAX_PREALLOC: u64 = 1 << 20;

/// Read a whole member. The central directory size is only a hint.
fn read_member<R: Read>(mut member: R, declared_size: u64) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(declared_size.min(MAX_PREALLOC) as usize);
    member.read_to_end(&mut buf)?;
    Ok(buf)
}
