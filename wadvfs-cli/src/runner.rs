//! Shared setup: effective settings and the bootstrap run.

use std::path::PathBuf;

use tracing::debug;
use wadvfs::boot::{BootOutcome, Bootstrap, RequiredContainers, SearchPathFinder};
use wadvfs::config::{config_file_path, ConfigFile};
use wadvfs::LoaderRegistry;

use crate::error::CliError;
use crate::prompt::TerminalPrompt;

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Config file to use instead of the default.
    pub config: Option<PathBuf>,

    /// Directories searched before the configured ones.
    pub data_dirs: Vec<PathBuf>,

    /// Patch containers mounted after the configured ones.
    pub files: Vec<PathBuf>,

    /// Log level override.
    pub log_level: Option<String>,

    /// Never prompt, even on a terminal.
    pub no_prompt: bool,
}

/// Configuration with CLI overrides applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: ConfigFile,
    pub config_path: Option<PathBuf>,
    pub no_prompt: bool,
}

impl Settings {
    /// Load the config file and apply overrides.
    ///
    /// An explicitly given config file must exist; the default one may not.
    pub fn load(overrides: &Overrides) -> Result<Self, CliError> {
        let (mut config, config_path) = match &overrides.config {
            Some(path) => (ConfigFile::load_from(path)?, Some(path.clone())),
            None => (ConfigFile::load()?, config_file_path()),
        };

        if !overrides.data_dirs.is_empty() {
            let mut search_paths = overrides.data_dirs.clone();
            search_paths.append(&mut config.data.search_paths);
            config.data.search_paths = search_paths;
        }
        config
            .data
            .extra_containers
            .extend(overrides.files.iter().cloned());
        if let Some(level) = &overrides.log_level {
            config.logging.level = level.clone();
        }

        Ok(Self {
            config,
            config_path,
            no_prompt: overrides.no_prompt,
        })
    }

    /// Whether the missing-ROM prompt may be shown.
    pub fn interactive(&self) -> bool {
        !self.no_prompt && self.config.bootstrap.interactive_recovery && TerminalPrompt::available()
    }
}

/// Run the bootstrap sequence with the effective settings.
pub fn bootstrap(settings: &Settings) -> Result<BootOutcome, CliError> {
    let data = &settings.config.data;
    let registry = LoaderRegistry::with_defaults();
    let finder = SearchPathFinder::from_config(data);
    debug!(dirs = ?finder.dirs(), "Search directories");

    let prompt = TerminalPrompt;
    let mut boot = Bootstrap::new(&registry, &finder)
        .with_containers(RequiredContainers::new(
            data.base_container.as_str(),
            data.supplemental_container.as_str(),
        ))
        .with_extra_containers(data.extra_containers.iter().cloned());
    if let Some(dir) = &data.install_dir {
        boot = boot.with_install_dir(dir.clone());
    }
    if settings.interactive() {
        boot = boot.with_recovery(&prompt);
    }

    Ok(boot.run()?)
}
