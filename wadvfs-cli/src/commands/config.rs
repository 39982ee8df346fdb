//! Configuration CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use std::io;
use std::path::PathBuf;

use clap::Subcommand;
use wadvfs::config::{config_file_path, ConfigFile};

use crate::error::CliError;
use crate::runner::Settings;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration (file plus command-line overrides)
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, settings: &Settings) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(settings),
        ConfigCommands::Show => run_show(settings),
        ConfigCommands::Init { force } => run_init(settings, force),
    }
}

fn target_path(settings: &Settings) -> Result<PathBuf, CliError> {
    settings
        .config_path
        .clone()
        .or_else(config_file_path)
        .ok_or_else(|| CliError::Usage("no home directory; pass --config".to_string()))
}

fn run_path(settings: &Settings) -> Result<(), CliError> {
    let path = target_path(settings)?;
    let state = if path.exists() { "" } else { " (not created)" };
    println!("{}{}", path.display(), state);
    Ok(())
}

fn run_show(settings: &Settings) -> Result<(), CliError> {
    settings
        .config
        .to_ini()
        .write_to(&mut io::stdout())
        .map_err(|source| CliError::Output {
            path: PathBuf::from("<stdout>"),
            source,
        })
}

fn run_init(settings: &Settings, force: bool) -> Result<(), CliError> {
    let path = target_path(settings)?;
    if path.exists() && !force {
        return Err(CliError::Usage(format!(
            "{} already exists; use --force to overwrite",
            path.display()
        )));
    }

    ConfigFile::default().save_to(&path)?;
    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to customize search paths and containers.");
    println!("Command-line arguments override config file values when specified.");
    Ok(())
}
