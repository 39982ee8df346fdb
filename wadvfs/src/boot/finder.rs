//! Locating data files on the host filesystem.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::DataFileFinder;
use crate::config::DataConfig;

/// Environment variable holding extra search directories.
pub const SEARCH_PATH_ENV: &str = "WADVFS_PATH";

/// Finds data files by scanning an ordered list of directories.
///
/// Within each directory an exact file name match is preferred, then an
/// ASCII case-insensitive one (`DOOM64.ROM` satisfies `doom64.rom`). The
/// first directory with a match wins.
#[derive(Debug, Clone, Default)]
pub struct SearchPathFinder {
    dirs: Vec<PathBuf>,
}

impl SearchPathFinder {
    /// Create a finder over exactly these directories, in order.
    pub fn new(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut finder = Self::default();
        for dir in dirs {
            finder.push(dir);
        }
        finder
    }

    /// Create a finder with the standard search order.
    ///
    /// 1. Configured `search_paths`
    /// 2. Directories in `WADVFS_PATH`
    /// 3. The current directory
    /// 4. The executable's directory
    /// 5. The install directory
    /// 6. The platform data directory (`<data_dir>/wadvfs`)
    pub fn from_config(config: &DataConfig) -> Self {
        let mut finder = Self::new(config.search_paths.iter().cloned());

        if let Some(value) = env::var_os(SEARCH_PATH_ENV) {
            for dir in env::split_paths(&value) {
                finder.push(dir);
            }
        }
        if let Ok(cwd) = env::current_dir() {
            finder.push(cwd);
        }
        if let Some(exe_dir) = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            finder.push(exe_dir);
        }
        if let Some(install_dir) = &config.install_dir {
            finder.push(install_dir.clone());
        }
        if let Some(data_dir) = dirs::data_dir() {
            finder.push(data_dir.join("wadvfs"));
        }

        finder
    }

    /// Append a directory unless it is already searched.
    pub fn push(&mut self, dir: PathBuf) {
        if dir.as_os_str().is_empty() || self.dirs.contains(&dir) {
            return;
        }
        self.dirs.push(dir);
    }

    /// Directories in search order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn find_in(dir: &Path, name: &str) -> Option<PathBuf> {
        let exact = dir.join(name);
        if exact.is_file() {
            return Some(exact);
        }

        let entries = fs::read_dir(dir).ok()?;
        let mut matches: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.eq_ignore_ascii_case(name))
            })
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        // Directory order is unspecified; keep the choice stable.
        matches.sort();
        matches.into_iter().next()
    }
}

impl DataFileFinder for SearchPathFinder {
    fn find_data_file(&self, name: &str) -> Option<PathBuf> {
        for dir in &self.dirs {
            if let Some(path) = Self::find_in(dir, name) {
                debug!(name, path = %path.display(), "Found data file");
                return Some(path);
            }
        }
        debug!(name, searched = self.dirs.len(), "Data file not found");
        None
    }
}
