//! IWAD / PWAD container loader.
//!
//! # Layout
//!
//! ```text
//! offset 0   "IWAD" | "PWAD"
//! offset 4   lump count         (i32, little-endian)
//! offset 8   directory offset   (i32, little-endian)
//! ...        lump data
//! directory  count × { filepos: i32, size: i32, name: [u8; 8] }
//! ```
//!
//! Doom 64 sets the high bit of a lump name's first byte to flag compressed
//! lumps. For those the declared size is the *decompressed* size, so the
//! stored length runs up to the next lump (or the directory). Payloads are
//! never decompressed here.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;
use parking_lot::Mutex;

use super::{read_magic, Loader, ProbeError};
use crate::device::{dedup_last_wins, Device, DeviceOrigin, Entry, Locator, ReadError};

/// Size of the WAD header in bytes.
pub(crate) const HEADER_LEN: u64 = 12;

/// Size of one directory record in bytes.
pub(crate) const DIRECTORY_RECORD_LEN: u64 = 16;

/// Which flavor of WAD the magic announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WadKind {
    /// Complete game data.
    Iwad,
    /// Patch data layered over an IWAD.
    Pwad,
}

impl WadKind {
    /// Recognize the magic at the start of a WAD.
    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        match magic.get(..4)? {
            b"IWAD" => Some(WadKind::Iwad),
            b"PWAD" => Some(WadKind::Pwad),
            _ => None,
        }
    }
}

/// Parsed WAD header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WadHeader {
    pub kind: WadKind,
    pub lump_count: u64,
    pub directory_offset: u64,
}

impl WadHeader {
    /// Parse a header. Returns `Ok(None)` when the magic does not match.
    pub fn parse(bytes: &[u8]) -> Result<Option<Self>, String> {
        let Some(kind) = WadKind::from_magic(bytes) else {
            return Ok(None);
        };
        if (bytes.len() as u64) < HEADER_LEN {
            return Err("header is truncated".to_string());
        }

        let lump_count = read_i32(bytes, 4);
        let directory_offset = read_i32(bytes, 8);
        if lump_count < 0 {
            return Err(format!("negative lump count {}", lump_count));
        }
        if directory_offset < 0 {
            return Err(format!("negative directory offset {}", directory_offset));
        }

        Ok(Some(Self {
            kind,
            lump_count: lump_count as u64,
            directory_offset: directory_offset as u64,
        }))
    }

    /// Length of the directory table in bytes.
    pub fn directory_len(&self) -> u64 {
        self.lump_count * DIRECTORY_RECORD_LEN
    }

    /// Check that the directory fits in a WAD of `wad_len` bytes.
    pub fn check_directory_bounds(&self, wad_len: u64) -> Result<(), String> {
        let end = self.directory_offset + self.directory_len();
        if end > wad_len {
            return Err(format!(
                "directory ({} lumps at offset {}) runs past end of data ({} bytes)",
                self.lump_count, self.directory_offset, wad_len
            ));
        }
        Ok(())
    }
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Decode an 8-byte lump name.
///
/// Returns the name and whether the Doom 64 compression flag was set.
pub(crate) fn decode_lump_name(raw: &[u8]) -> (String, bool) {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let mut name = raw[..end].to_vec();
    let compressed = name.first().is_some_and(|b| b & 0x80 != 0);
    if let Some(first) = name.first_mut() {
        *first &= 0x7f;
    }
    (String::from_utf8_lossy(&name).into_owned(), compressed)
}

/// Build entries from a raw directory table.
///
/// * `table` - the directory bytes (`lump_count * 16`)
/// * `header` - the parsed header, used for the compressed-lump boundary
/// * `wad_len` - bytes available from the WAD start
/// * `base` - absolute offset of the WAD start inside its container
pub(crate) fn parse_directory(
    table: &[u8],
    header: &WadHeader,
    wad_len: u64,
    base: u64,
) -> Result<Vec<Entry>, String> {
    struct Record {
        name: String,
        compressed: bool,
        filepos: u64,
        size: u64,
    }

    let mut records = Vec::with_capacity(header.lump_count as usize);
    for (index, raw) in table
        .chunks_exact(DIRECTORY_RECORD_LEN as usize)
        .enumerate()
    {
        let filepos = read_i32(raw, 0);
        let size = read_i32(raw, 4);
        if filepos < 0 || size < 0 {
            return Err(format!(
                "lump {} has negative position or size ({}, {})",
                index, filepos, size
            ));
        }
        let (name, compressed) = decode_lump_name(&raw[8..16]);
        records.push(Record {
            name,
            compressed,
            filepos: filepos as u64,
            size: size as u64,
        });
    }

    // Compressed lumps end where the next stored lump (or the directory) begins.
    let mut boundaries: Vec<u64> = records
        .iter()
        .filter(|r| r.size > 0)
        .map(|r| r.filepos)
        .chain([header.directory_offset, wad_len])
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut entries = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let stored_len = if record.compressed && record.size > 0 {
            boundaries
                .iter()
                .copied()
                .find(|&b| b > record.filepos)
                .map(|next| next - record.filepos)
                .unwrap_or(0)
        } else {
            record.size
        };

        if stored_len > 0 && record.filepos + stored_len > wad_len {
            return Err(format!(
                "lump {} ({}) at offset {} with {} bytes runs past end of data ({} bytes)",
                index, record.name, record.filepos, stored_len, wad_len
            ));
        }

        entries.push(Entry::new(
            &record.name,
            Locator::span(base + record.filepos, stored_len),
            stored_len,
        ));
    }

    Ok(dedup_last_wins(entries))
}

/// Loader for IWAD and PWAD files.
#[derive(Debug, Default, Clone, Copy)]
pub struct WadLoader;

impl Loader for WadLoader {
    fn name(&self) -> &'static str {
        "wad"
    }

    fn probe(&self, path: &Path) -> Result<Option<Box<dyn Device>>, ProbeError> {
        let magic = read_magic(path, HEADER_LEN as usize)?;
        let header = match WadHeader::parse(&magic).map_err(ProbeError::Corrupt)? {
            Some(header) => header,
            None => return Ok(None),
        };

        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        header
            .check_directory_bounds(file_len)
            .map_err(ProbeError::Corrupt)?;

        let mut table = vec![0u8; header.directory_len() as usize];
        file.seek(SeekFrom::Start(header.directory_offset))?;
        file.read_exact(&mut table)?;

        let entries = parse_directory(&table, &header, file_len, 0).map_err(ProbeError::Corrupt)?;

        Ok(Some(Box::new(WadDevice {
            origin: DeviceOrigin::new(path),
            kind: header.kind,
            file: Mutex::new(file),
            len: file_len,
            entries,
        })))
    }
}

/// An opened WAD file.
///
/// Reads share one file handle behind a mutex: each read seeks and reads
/// while holding the lock.
#[derive(Debug)]
pub struct WadDevice {
    origin: DeviceOrigin,
    kind: WadKind,
    file: Mutex<File>,
    len: u64,
    entries: Vec<Entry>,
}

impl WadDevice {
    /// IWAD or PWAD.
    pub fn kind(&self) -> WadKind {
        self.kind
    }
}

impl Device for WadDevice {
    fn label(&self) -> &str {
        &self.origin.label
    }

    fn format(&self) -> &'static str {
        "wad"
    }

    fn path(&self) -> &Path {
        &self.origin.path
    }

    fn list(&self) -> &[Entry] {
        &self.entries
    }

    fn read(&self, locator: &Locator) -> Result<Bytes, ReadError> {
        let Locator::Span { offset, length } = *locator else {
            return Err(ReadError::InvalidLocator {
                device: self.origin.label.clone(),
                locator: *locator,
            });
        };
        if offset.checked_add(length).map_or(true, |end| end > self.len) {
            return Err(ReadError::Truncated {
                device: self.origin.label.clone(),
                offset,
                length,
            });
        }

        let mut buf = vec![0u8; length as usize];
        let mut file = self.file.lock();
        let io_err = |source| ReadError::Io {
            device: self.origin.label.clone(),
            source,
        };
        file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
        file.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ReadError::Truncated {
                    device: self.origin.label.clone(),
                    offset,
                    length,
                }
            } else {
                io_err(e)
            }
        })?;

        Ok(Bytes::from(buf))
    }
}
