//! INI configuration file.
//!
//! Settings live in `~/.wadvfs/config.ini`. A missing file is not an error:
//! every setting has a default, and the CLI can override most of them with
//! flags.
//!
//! ```ini
//! [data]
//! base_container = doom64.rom
//! supplemental_container = doom64ex.pk3
//! search_paths = /games/doom64;/mnt/roms
//! install_dir = ~/.wadvfs/data
//! extra_containers = /mods/brightmaps.pk3
//!
//! [bootstrap]
//! interactive_recovery = true
//!
//! [logging]
//! level = info
//! directory = ~/.wadvfs/logs
//! ```
//!
//! List values are separated by `;`. A leading `~` expands to the home
//! directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::boot::{DEFAULT_BASE_CONTAINER, DEFAULT_SUPPLEMENTAL_CONTAINER};

/// Directory under the home directory holding config and data.
pub const CONFIG_DIR_NAME: &str = ".wadvfs";

/// Config file name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Separator for list values.
pub const LIST_SEPARATOR: char = ';';

const SECTION_DATA: &str = "data";
const SECTION_BOOTSTRAP: &str = "bootstrap";
const SECTION_LOGGING: &str = "logging";

/// Errors from loading or saving the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid INI.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A key holds a value of the wrong shape.
    #[error("invalid value '{value}' for {section}.{key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// `[data]` section: which containers to load and where to look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConfig {
    /// File name of the base container.
    pub base_container: String,

    /// File name of the supplemental container.
    pub supplemental_container: String,

    /// Directories searched before the built-in locations.
    pub search_paths: Vec<PathBuf>,

    /// Where a user-selected base container is copied.
    pub install_dir: Option<PathBuf>,

    /// Patch containers mounted after the required ones.
    pub extra_containers: Vec<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_container: DEFAULT_BASE_CONTAINER.to_string(),
            supplemental_container: DEFAULT_SUPPLEMENTAL_CONTAINER.to_string(),
            search_paths: Vec::new(),
            install_dir: config_dir().map(|dir| dir.join("data")),
            extra_containers: Vec::new(),
        }
    }
}

/// `[bootstrap]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Whether a missing base container may be selected interactively.
    pub interactive_recovery: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            interactive_recovery: true,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset (e.g. "info").
    pub level: String,

    /// Directory for the log file. No file logging when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub data: DataConfig,
    pub bootstrap: BootstrapConfig,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        match config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from a specific file. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(err) => ConfigError::Parse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_ini(&ini)
    }

    /// Build from parsed INI. Missing keys keep their defaults.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some(SECTION_DATA)) {
            let data = &mut config.data;
            if let Some(v) = non_empty(section.get("base_container")) {
                data.base_container = v.to_string();
            }
            if let Some(v) = non_empty(section.get("supplemental_container")) {
                data.supplemental_container = v.to_string();
            }
            if let Some(v) = section.get("search_paths") {
                data.search_paths = parse_path_list(v);
            }
            if let Some(v) = section.get("install_dir") {
                data.install_dir = non_empty(Some(v)).map(expand_tilde);
            }
            if let Some(v) = section.get("extra_containers") {
                data.extra_containers = parse_path_list(v);
            }
        }

        if let Some(section) = ini.section(Some(SECTION_BOOTSTRAP)) {
            if let Some(v) = section.get("interactive_recovery") {
                config.bootstrap.interactive_recovery =
                    parse_bool(v).ok_or_else(|| ConfigError::InvalidValue {
                        section: SECTION_BOOTSTRAP,
                        key: "interactive_recovery",
                        value: v.to_string(),
                        reason: "expected true or false",
                    })?;
            }
        }

        if let Some(section) = ini.section(Some(SECTION_LOGGING)) {
            if let Some(v) = non_empty(section.get("level")) {
                config.logging.level = v.to_string();
            }
            if let Some(v) = section.get("directory") {
                config.logging.directory = non_empty(Some(v)).map(expand_tilde);
            }
        }

        Ok(config)
    }

    /// Render as INI.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some(SECTION_DATA))
            .set("base_container", self.data.base_container.as_str())
            .set(
                "supplemental_container",
                self.data.supplemental_container.as_str(),
            )
            .set("search_paths", join_path_list(&self.data.search_paths))
            .set(
                "install_dir",
                self.data
                    .install_dir
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            )
            .set(
                "extra_containers",
                join_path_list(&self.data.extra_containers),
            );

        ini.with_section(Some(SECTION_BOOTSTRAP)).set(
            "interactive_recovery",
            self.bootstrap.interactive_recovery.to_string(),
        );

        ini.with_section(Some(SECTION_LOGGING))
            .set("level", self.logging.level.as_str())
            .set(
                "directory",
                self.logging
                    .directory
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            );

        ini
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = config_file_path().ok_or_else(|| ConfigError::Io {
            path: PathBuf::from(CONFIG_FILE_NAME),
            source: io::Error::new(io::ErrorKind::NotFound, "no home directory"),
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        self.to_ini().write_to_file(path).map_err(io_error)?;
        debug!(path = %path.display(), "Saved config file");
        Ok(())
    }
}

/// `~/.wadvfs`, if a home directory is known.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME))
}

/// `~/.wadvfs/config.ini`, if a home directory is known.
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(value: &str) -> PathBuf {
    let rest = match value.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => rest,
        _ => return PathBuf::from(value),
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(value),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_path_list(value: &str) -> Vec<PathBuf> {
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(expand_tilde)
        .collect()
}

fn join_path_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(&LIST_SEPARATOR.to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}
