//! Nintendo 64 ROM image loader.
//!
//! The Doom 64 cartridge carries its game data as an IWAD embedded in the ROM.
//! This loader recognizes a ROM dump in any of the three common byte orders,
//! normalizes it to big-endian (`.z64`) order in memory, locates the embedded
//! IWAD and exposes its lumps like any other WAD.
//!
//! | Dump   | First word    | Transform to `.z64`        |
//! |--------|---------------|----------------------------|
//! | `.z64` | `80 37 12 40` | none                       |
//! | `.v64` | `37 80 40 12` | swap bytes in each u16     |
//! | `.n64` | `40 12 37 80` | reverse bytes in each u32  |
//!
//! The whole image lives in an immutable [`Bytes`] buffer, so reads are
//! zero-copy slices and need no locking.

use std::fmt;
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, warn};

use super::wad::{parse_directory, WadHeader, WadKind, DIRECTORY_RECORD_LEN, HEADER_LEN};
use super::{read_magic, Loader, ProbeError};
use crate::device::{Device, DeviceOrigin, Entry, Locator, ReadError};

/// Length of the cartridge header.
const ROM_HEADER_LEN: usize = 0x40;

/// Offset and length of the internal game title.
const TITLE_RANGE: std::ops::Range<usize> = 0x20..0x34;

/// Offset and length of the four-character game code.
const GAME_CODE_RANGE: std::ops::Range<usize> = 0x3B..0x3F;

/// Byte order of a ROM dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomByteOrder {
    /// Native big-endian (`.z64`).
    BigEndian,
    /// 16-bit byte-swapped (`.v64`).
    ByteSwapped,
    /// 32-bit little-endian (`.n64`).
    LittleEndian,
}

impl RomByteOrder {
    /// Recognize the byte order from the first word of a dump.
    pub fn detect(magic: &[u8]) -> Option<Self> {
        match magic.get(..4)? {
            [0x80, 0x37, 0x12, 0x40] => Some(RomByteOrder::BigEndian),
            [0x37, 0x80, 0x40, 0x12] => Some(RomByteOrder::ByteSwapped),
            [0x40, 0x12, 0x37, 0x80] => Some(RomByteOrder::LittleEndian),
            _ => None,
        }
    }

    /// Conventional file extension for this byte order.
    pub fn extension(&self) -> &'static str {
        match self {
            RomByteOrder::BigEndian => "z64",
            RomByteOrder::ByteSwapped => "v64",
            RomByteOrder::LittleEndian => "n64",
        }
    }

    /// Rewrite `image` in place into big-endian order.
    pub fn normalize(&self, image: &mut [u8]) -> Result<(), String> {
        match self {
            RomByteOrder::BigEndian => {}
            RomByteOrder::ByteSwapped => {
                if image.len() % 2 != 0 {
                    return Err(format!("byte-swapped image has odd length {}", image.len()));
                }
                for pair in image.chunks_exact_mut(2) {
                    pair.swap(0, 1);
                }
            }
            RomByteOrder::LittleEndian => {
                if image.len() % 4 != 0 {
                    return Err(format!(
                        "little-endian image length {} is not a multiple of 4",
                        image.len()
                    ));
                }
                for word in image.chunks_exact_mut(4) {
                    word.reverse();
                }
            }
        }
        Ok(())
    }
}

/// Location of the IWAD inside a ROM image and its lumps.
struct EmbeddedWad {
    offset: u64,
    entries: Vec<Entry>,
}

/// Scan 4-byte aligned offsets after the header for a valid IWAD.
fn find_embedded_wad(image: &[u8]) -> Option<EmbeddedWad> {
    let mut offset = ROM_HEADER_LEN;
    while offset + HEADER_LEN as usize <= image.len() {
        if &image[offset..offset + 4] == b"IWAD" {
            if let Some(entries) = try_wad_at(image, offset) {
                return Some(EmbeddedWad {
                    offset: offset as u64,
                    entries,
                });
            }
            debug!(offset, "Rejected IWAD candidate");
        }
        offset += 4;
    }
    None
}

fn try_wad_at(image: &[u8], offset: usize) -> Option<Vec<Entry>> {
    let wad = &image[offset..];
    let header = WadHeader::parse(wad).ok()??;
    if header.kind != WadKind::Iwad || header.lump_count == 0 {
        return None;
    }
    let wad_len = wad.len() as u64;
    header.check_directory_bounds(wad_len).ok()?;

    let start = header.directory_offset as usize;
    let end = start + (header.lump_count * DIRECTORY_RECORD_LEN) as usize;
    parse_directory(&wad[start..end], &header, wad_len, offset as u64).ok()
}

/// Trim padding and control bytes from a header text field.
fn header_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

/// Loader for N64 ROM images.
#[derive(Debug, Default, Clone, Copy)]
pub struct RomLoader;

impl Loader for RomLoader {
    fn name(&self) -> &'static str {
        "rom"
    }

    fn probe(&self, path: &Path) -> Result<Option<Box<dyn Device>>, ProbeError> {
        let magic = read_magic(path, 4)?;
        let Some(byte_order) = RomByteOrder::detect(&magic) else {
            return Ok(None);
        };

        let mut image = std::fs::read(path)?;
        if image.len() < ROM_HEADER_LEN {
            return Err(ProbeError::Corrupt(format!(
                "image is {} bytes, shorter than the cartridge header",
                image.len()
            )));
        }
        byte_order.normalize(&mut image).map_err(ProbeError::Corrupt)?;

        let title = header_text(&image[TITLE_RANGE]);
        let game_code = header_text(&image[GAME_CODE_RANGE]);

        let (wad_offset, entries) = match find_embedded_wad(&image) {
            Some(wad) => {
                debug!(
                    path = %path.display(),
                    offset = wad.offset,
                    lumps = wad.entries.len(),
                    "Found embedded IWAD"
                );
                (Some(wad.offset), wad.entries)
            }
            None => {
                warn!(
                    path = %path.display(),
                    title = %title,
                    "ROM image has no embedded IWAD; mounting with no entries"
                );
                (None, Vec::new())
            }
        };

        Ok(Some(Box::new(RomDevice {
            origin: DeviceOrigin::new(path),
            byte_order,
            title,
            game_code,
            wad_offset,
            image: Bytes::from(image),
            entries,
        })))
    }
}

/// An N64 ROM image held in memory.
pub struct RomDevice {
    origin: DeviceOrigin,
    byte_order: RomByteOrder,
    title: String,
    game_code: String,
    wad_offset: Option<u64>,
    image: Bytes,
    entries: Vec<Entry>,
}

impl fmt::Debug for RomDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RomDevice")
            .field("path", &self.origin.path)
            .field("byte_order", &self.byte_order)
            .field("title", &self.title)
            .field("game_code", &self.game_code)
            .field("wad_offset", &self.wad_offset)
            .field("image_len", &self.image.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl RomDevice {
    /// Byte order of the dump on disk.
    pub fn byte_order(&self) -> RomByteOrder {
        self.byte_order
    }

    /// Internal game title from the cartridge header.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Four-character game code (e.g. "NDME" for Doom 64 US).
    pub fn game_code(&self) -> &str {
        &self.game_code
    }

    /// Offset of the embedded IWAD, if one was found.
    pub fn wad_offset(&self) -> Option<u64> {
        self.wad_offset
    }
}

impl Device for RomDevice {
    fn label(&self) -> &str {
        &self.origin.label
    }

    fn format(&self) -> &'static str {
        "rom"
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
        let end = match offset.checked_add(length) {
            Some(end) if end <= self.image.len() as u64 => end,
            _ => {
                return Err(ReadError::Truncated {
                    device: self.origin.label.clone(),
                    offset,
                    length,
                })
            }
        };
        Ok(self.image.slice(offset as usize..end as usize))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::loader::wad::tests::build_wad;
    use tempfile::TempDir;

    /// Offset the test IWAD is placed at inside the image.
    pub(crate) const TEST_WAD_OFFSET: usize = 0x1000;

    /// Build a big-endian ROM image with an embedded IWAD.
    ///
    /// The WAD's internal offsets are relative to its own start, which is how
    /// the cartridge stores it.
    pub(crate) fn build_rom(lumps: &[(&[u8], &[u8])]) -> Vec<u8> {
        let mut image = vec![0u8; TEST_WAD_OFFSET];
        image[..4].copy_from_slice(&[0x80, 0x37, 0x12, 0x40]);
        image[TITLE_RANGE.start..TITLE_RANGE.start + 6].copy_from_slice(b"Doom64");
        for b in &mut image[TITLE_RANGE.start + 6..TITLE_RANGE.end] {
            *b = b' ';
        }
        image[GAME_CODE_RANGE].copy_from_slice(b"NDME");
        image.extend_from_slice(&build_wad(b"IWAD", lumps));
        while image.len() % 4 != 0 {
            image.push(0);
        }
        image
    }

    fn to_v64(image: &[u8]) -> Vec<u8> {
        image.chunks(2).flat_map(|p| [p[1], p[0]]).collect()
    }

    fn to_n64(image: &[u8]) -> Vec<u8> {
        image
            .chunks(4)
            .flat_map(|w| [w[3], w[2], w[1], w[0]])
            .collect()
    }

    fn write(temp: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = temp.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_detect_byte_order() {
        assert_eq!(
            RomByteOrder::detect(&[0x80, 0x37, 0x12, 0x40]),
            Some(RomByteOrder::BigEndian)
        );
        assert_eq!(
            RomByteOrder::detect(&[0x37, 0x80, 0x40, 0x12]),
            Some(RomByteOrder::ByteSwapped)
        );
        assert_eq!(
            RomByteOrder::detect(&[0x40, 0x12, 0x37, 0x80]),
            Some(RomByteOrder::LittleEndian)
        );
        assert_eq!(RomByteOrder::detect(b"IWAD"), None);
        assert_eq!(RomByteOrder::BigEndian.extension(), "z64");
    }

    #[test]
    fn test_probe_exposes_embedded_wad() {
        let temp = TempDir::new().unwrap();
        let image = build_rom(&[(b"PLAYPAL", b"palette"), (b"MAP01", b"level")]);
        let path = write(&temp, "doom64.rom", &image);

        let device = RomLoader.probe(&path).unwrap().expect("should recognize ROM");

        assert_eq!(device.format(), "rom");
        let names: Vec<_> = device.list().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["playpal", "map01"]);

        let entry = device.entry("PLAYPAL").unwrap();
        assert_eq!(
            entry.locator,
            Locator::span((TEST_WAD_OFFSET + HEADER_LEN as usize) as u64, 7)
        );
        assert_eq!(device.read(&entry.locator).unwrap(), Bytes::from_static(b"palette"));
    }

    #[test]
    fn test_all_byte_orders_read_the_same() {
        let temp = TempDir::new().unwrap();
        let image = build_rom(&[(b"TITLE", b"doom sixty four")]);

        for (name, bytes) in [
            ("a.z64", image.clone()),
            ("a.v64", to_v64(&image)),
            ("a.n64", to_n64(&image)),
        ] {
            let path = write(&temp, name, &bytes);
            let device = RomLoader.probe(&path).unwrap().unwrap();
            let entry = device.entry("title").unwrap();
            assert_eq!(
                device.read(&entry.locator).unwrap(),
                Bytes::from_static(b"doom sixty four"),
                "byte order of {}",
                name
            );
        }
    }

    #[test]
    fn test_header_fields() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "d.z64", &build_rom(&[(b"A", b"1")]));

        let loaded = RomLoader.probe(&path).unwrap().unwrap();
        let debug = format!("{:?}", loaded);
        assert!(debug.contains("Doom64"));
        assert!(debug.contains("NDME"));
    }

    #[test]
    fn test_rom_without_wad_has_no_entries() {
        let temp = TempDir::new().unwrap();
        let mut image = vec![0u8; 0x200];
        image[..4].copy_from_slice(&[0x80, 0x37, 0x12, 0x40]);
        let path = write(&temp, "other.z64", &image);

        let device = RomLoader.probe(&path).unwrap().unwrap();
        assert!(device.list().is_empty());
    }

    #[test]
    fn test_bogus_iwad_magic_is_skipped() {
        let mut image = build_rom(&[(b"REAL", b"data")]);
        // Plant an "IWAD" string with a nonsense header before the real one.
        image[0x100..0x104].copy_from_slice(b"IWAD");
        image[0x104..0x108].copy_from_slice(&i32::MAX.to_le_bytes());

        let wad = find_embedded_wad(&image).unwrap();
        assert_eq!(wad.offset, TEST_WAD_OFFSET as u64);
        assert_eq!(wad.entries[0].name, "real");
    }

    #[test]
    fn test_short_image_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "tiny.z64", &[0x80, 0x37, 0x12, 0x40, 0, 0, 0, 0]);

        let err = RomLoader.probe(&path).unwrap_err();
        assert!(matches!(err, ProbeError::Corrupt(_)));
    }

    #[test]
    fn test_odd_length_v64_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let mut image = to_v64(&build_rom(&[(b"A", b"1")]));
        image.push(0);
        let path = write(&temp, "odd.v64", &image);

        let err = RomLoader.probe(&path).unwrap_err();
        assert!(err.to_string().contains("odd length"));
    }

    #[test]
    fn test_non_rom_is_not_recognized() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "x.wad", &build_wad(b"IWAD", &[(b"A", b"1")]));

        assert!(RomLoader.probe(&path).unwrap().is_none());
    }

    #[test]
    fn test_read_past_image_is_truncated() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "d.z64", &build_rom(&[(b"A", b"1")]));

        let device = RomLoader.probe(&path).unwrap().unwrap();
        assert!(matches!(
            device.read(&Locator::span(1 << 30, 4)),
            Err(ReadError::Truncated { .. })
        ));
    }

    #[test]
    fn test_overflowing_span_is_truncated() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "d.z64", &build_rom(&[(b"A", b"1")]));

        let device = RomLoader.probe(&path).unwrap().unwrap();
        assert!(matches!(
            device.read(&Locator::span(u64::MAX, 2)),
            Err(ReadError::Truncated { offset: u64::MAX, length: 2, .. })
        ));
    }
}
