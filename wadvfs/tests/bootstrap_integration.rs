//! Integration tests for the startup sequence over real container files.
//!
//! Fixtures are assembled on the fly in temporary directories:
//! - a Doom 64 ROM image with an embedded IWAD (in all three dump orders)
//! - a PK3 written with `zip::ZipWriter`
//! - a PWAD patch
//!
//! Run with: `cargo test --test bootstrap_integration`

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use wadvfs::boot::{BootError, Bootstrap, RecoveryPrompt, SearchPathFinder};
use wadvfs::loader::{LoaderRegistry, MountError};

// ============================================================================
// Fixture Builders
// ============================================================================

fn wad_bytes(magic: &[u8; 4], lumps: &[(&str, &[u8])]) -> Vec<u8> {
    let mut data = Vec::new();
    let mut directory = Vec::new();
    let mut pos = 12i32;
    for (name, bytes) in lumps {
        directory.extend_from_slice(&pos.to_le_bytes());
        directory.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
        let mut field = [0u8; 8];
        field[..name.len()].copy_from_slice(name.as_bytes());
        directory.extend_from_slice(&field);
        data.extend_from_slice(bytes);
        pos += bytes.len() as i32;
    }

    let mut out = Vec::new();
    out.extend_from_slice(magic);
    out.extend_from_slice(&(lumps.len() as i32).to_le_bytes());
    out.extend_from_slice(&pos.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&directory);
    out
}

/// Big-endian ROM image with the IWAD at 0x2000.
fn rom_bytes(lumps: &[(&str, &[u8])]) -> Vec<u8> {
    let mut image = vec![0u8; 0x2000];
    image[..4].copy_from_slice(&[0x80, 0x37, 0x12, 0x40]);
    image[0x20..0x26].copy_from_slice(b"DOOM64");
    image[0x3B..0x3F].copy_from_slice(b"NDME");
    image.extend_from_slice(&wad_bytes(b"IWAD", lumps));
    while image.len() % 4 != 0 {
        image.push(0);
    }
    image
}

fn byte_swapped(image: &[u8]) -> Vec<u8> {
    image.chunks(2).flat_map(|p| [p[1], p[0]]).collect()
}

fn little_endian(image: &[u8]) -> Vec<u8> {
    image
        .chunks(4)
        .flat_map(|w| [w[3], w[2], w[1], w[0]])
        .collect()
}

fn pk3_bytes(dirs: &[&str], files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for dir in dirs {
        writer.add_directory(*dir, options).unwrap();
    }
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

const ROM_LUMPS: &[(&str, &[u8])] = &[
    ("PLAYPAL", b"rom-palette"),
    ("MAP01", b"rom-map01"),
    ("DEMO1LMP", b"rom-demo"),
];

fn write_game_data(dir: &Path) {
    write(dir, "doom64.rom", &rom_bytes(ROM_LUMPS));
    write(
        dir,
        "doom64ex.pk3",
        &pk3_bytes(
            &["sprites/"],
            &[
                ("PLAYPAL", b"pk3-palette"),
                ("sprites/TROOA1.png", b"imp"),
                ("mapinfo.txt", b"map MAP01"),
            ],
        ),
    );
}

struct FixedPrompt(Option<PathBuf>);

impl RecoveryPrompt for FixedPrompt {
    fn select_file(&self, _wanted: &str) -> Option<PathBuf> {
        self.0.clone()
    }
}

// ============================================================================
// End-to-End Bootstrap
// ============================================================================

#[test]
fn test_bootstrap_merges_rom_and_pk3() {
    let temp = TempDir::new().unwrap();
    write_game_data(temp.path());

    let registry = LoaderRegistry::with_defaults();
    let finder = SearchPathFinder::new([temp.path().to_path_buf()]);
    let outcome = Bootstrap::new(&registry, &finder).run().unwrap();

    let namespace = &outcome.namespace;
    assert_eq!(namespace.resolve("PLAYPAL").unwrap().device, outcome.supplemental);
    assert_eq!(&namespace.read("playpal").unwrap()[..], b"pk3-palette");
    assert_eq!(&namespace.read("map01").unwrap()[..], b"rom-map01");
    assert_eq!(&namespace.read("Sprites/trooa1.PNG").unwrap()[..], b"imp");
    assert!(namespace.read("missing").unwrap_err().is_not_found());

    let formats: Vec<_> = namespace.devices().iter().map(|d| d.format).collect();
    assert_eq!(formats, vec!["rom", "pk3"]);
    // The sprites/ directory entry is not a name.
    assert_eq!(namespace.len(), 5);
}

#[test]
fn test_bootstrap_with_patch_and_uppercase_names() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "DOOM64.ROM", &rom_bytes(ROM_LUMPS));
    write(
        temp.path(),
        "Doom64EX.pk3",
        &pk3_bytes(&[], &[("PLAYPAL", b"pk3-palette")]),
    );
    let patch = write(
        temp.path(),
        "nightmare.wad",
        &wad_bytes(b"PWAD", &[("MAP01", b"patched-map01")]),
    );

    let registry = LoaderRegistry::with_defaults();
    let finder = SearchPathFinder::new([temp.path().to_path_buf()]);
    let outcome = Bootstrap::new(&registry, &finder)
        .with_extra_containers([patch])
        .run()
        .unwrap();

    assert_eq!(
        outcome.namespace.resolve("map01").unwrap().device,
        outcome.extras[0]
    );
    assert_eq!(&outcome.namespace.read("map01").unwrap()[..], b"patched-map01");
}

#[test]
fn test_missing_supplemental_is_fatal() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "doom64.rom", &rom_bytes(ROM_LUMPS));

    let registry = LoaderRegistry::with_defaults();
    let finder = SearchPathFinder::new([temp.path().to_path_buf()]);
    let err = Bootstrap::new(&registry, &finder).run().unwrap_err();

    assert!(err.is_fatal());
    assert!(err.to_string().contains("doom64ex.pk3"));
}

#[test]
fn test_corrupt_supplemental_is_fatal_mount_error() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "doom64.rom", &rom_bytes(ROM_LUMPS));
    // Zip magic followed by garbage.
    write(temp.path(), "doom64ex.pk3", b"PK\x03\x04 this is not really a zip");

    let registry = LoaderRegistry::with_defaults();
    let finder = SearchPathFinder::new([temp.path().to_path_buf()]);
    let err = Bootstrap::new(&registry, &finder).run().unwrap_err();

    match err {
        BootError::Mount { source, .. } => {
            assert!(matches!(source, MountError::CorruptContainer { loader: "pk3", .. }));
        }
        other => panic!("expected Mount error, got {other:?}"),
    }
}

#[test]
fn test_recovery_copies_dump_into_install_dir() {
    let search = TempDir::new().unwrap();
    let downloads = TempDir::new().unwrap();
    let install = TempDir::new().unwrap();
    write(
        search.path(),
        "doom64ex.pk3",
        &pk3_bytes(&[], &[("PLAYPAL", b"pk3-palette")]),
    );
    let dump = write(
        downloads.path(),
        "Doom 64 (USA).v64",
        &byte_swapped(&rom_bytes(ROM_LUMPS)),
    );

    let registry = LoaderRegistry::with_defaults();
    let finder = SearchPathFinder::new([search.path().to_path_buf()]);
    let prompt = FixedPrompt(Some(dump.clone()));
    let outcome = Bootstrap::new(&registry, &finder)
        .with_recovery(&prompt)
        .with_install_dir(install.path())
        .run()
        .unwrap();

    let installed = install.path().join("doom64.rom");
    assert_eq!(fs::read(&installed).unwrap(), fs::read(&dump).unwrap());
    assert_eq!(&outcome.namespace.read("map01").unwrap()[..], b"rom-map01");
}

#[test]
fn test_recovery_cancel_exits_cleanly() {
    let temp = TempDir::new().unwrap();
    let registry = LoaderRegistry::with_defaults();
    let finder = SearchPathFinder::new([temp.path().to_path_buf()]);
    let prompt = FixedPrompt(None);

    let err = Bootstrap::new(&registry, &finder)
        .with_recovery(&prompt)
        .with_install_dir(temp.path())
        .run()
        .unwrap_err();

    assert!(matches!(err, BootError::Cancelled));
    assert!(!err.is_fatal());
}

// ============================================================================
// ROM Dump Orders
// ============================================================================

#[test]
fn test_all_rom_dump_orders_expose_same_lumps() {
    let temp = TempDir::new().unwrap();
    let image = rom_bytes(ROM_LUMPS);
    let registry = LoaderRegistry::with_defaults();

    for (name, bytes) in [
        ("game.z64", image.clone()),
        ("game.v64", byte_swapped(&image)),
        ("game.n64", little_endian(&image)),
    ] {
        let path = write(temp.path(), name, &bytes);
        let device = registry.mount(&path).unwrap();

        assert_eq!(device.format(), "rom", "{name}");
        let entry = device.entry("PLAYPAL").unwrap();
        assert_eq!(&device.read(&entry.locator).unwrap()[..], b"rom-palette", "{name}");
        assert_eq!(device.list().len(), 3, "{name}");
    }
}
