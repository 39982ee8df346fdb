//! Startup sequence: locate, mount and merge the game's data containers.
//!
//! A session needs two containers, looked up by file name:
//!
//! | Container     | Default name    | If missing                          |
//! |---------------|-----------------|-------------------------------------|
//! | Base          | `doom64.rom`    | Ask the user (when allowed), else fatal |
//! | Supplemental  | `doom64ex.pk3`  | Fatal, no recovery                  |
//!
//! Optional patch containers are mounted after both and override them. The
//! merge runs once, after everything is mounted.
//!
//! Host interaction goes through two small traits so the sequence can be
//! driven in tests without touching a terminal:
//!
//! - [`DataFileFinder`] locates a data file by name
//! - [`RecoveryPrompt`] asks the user for a replacement base container

mod error;
mod finder;
mod state;

pub use error::BootError;
pub use finder::{SearchPathFinder, SEARCH_PATH_ENV};
pub use state::{
    BaseState, BootOutcome, Bootstrap, RequiredContainers, DEFAULT_BASE_CONTAINER,
    DEFAULT_SUPPLEMENTAL_CONTAINER,
};

use std::path::PathBuf;

/// Locates data files on the host.
pub trait DataFileFinder {
    /// Full path of the data file called `name`, if it exists anywhere the
    /// finder looks.
    fn find_data_file(&self, name: &str) -> Option<PathBuf>;
}

/// Asks the user to pick a file standing in for a missing container.
pub trait RecoveryPrompt {
    /// Path the user selected for `wanted`, or `None` if they cancelled.
    fn select_file(&self, wanted: &str) -> Option<PathBuf>;
}
