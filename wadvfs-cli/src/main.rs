//! wadvfs CLI - command-line interface
//!
//! Runs the startup sequence of the layered asset filesystem and lets you
//! inspect the merged namespace: which containers are mounted, which one
//! supplies a name, and what bytes it holds.

mod commands;
mod error;
mod prompt;
mod runner;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use wadvfs::logging::{init_logging, LoggingGuard};

use crate::commands::config::ConfigCommands;
use crate::error::CliError;
use crate::runner::{Overrides, Settings};

#[derive(Parser)]
#[command(name = "wadvfs")]
#[command(version = wadvfs::VERSION)]
#[command(about = "Layered asset filesystem for Doom 64 data", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.wadvfs/config.ini
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Extra directory to search for data files (repeatable, searched first)
    #[arg(long = "data-dir", global = true, value_name = "DIR")]
    data_dirs: Vec<PathBuf>,

    /// Patch container to mount after the required ones (repeatable)
    #[arg(long = "file", global = true, value_name = "PATH")]
    files: Vec<PathBuf>,

    /// Log level or filter directive (overrides config; RUST_LOG wins)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Never ask for a missing ROM, fail instead
    #[arg(long, global = true)]
    no_prompt: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate and mount all containers, then show the device table
    Mount {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List merged names
    Ls {
        /// Only names under this logical directory
        #[arg(long)]
        prefix: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which container supplies a name
    Which {
        /// Logical name (case-insensitive, '/' or '\' separated)
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the bytes behind a name to stdout or a file
    Cat {
        /// Logical name
        name: String,

        /// Output file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Open containers directly and report which loader recognizes them
    Probe {
        /// Container files to open
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// List every entry
        #[arg(long)]
        list: bool,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    let overrides = Overrides {
        config: cli.config,
        data_dirs: cli.data_dirs,
        files: cli.files,
        log_level: cli.log_level,
        no_prompt: cli.no_prompt,
    };

    let settings = match Settings::load(&overrides) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    // No subscriber yet, so this one goes straight to stderr.
    let _guard: LoggingGuard = match init_logging(&settings.config.logging).map_err(CliError::from)
    {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    if let Err(e) = run(cli.command, &settings) {
        let code = e.exit_code();
        if code == 0 {
            info!("{}", e);
            process::exit(0);
        }
        fatal(&e);
    }
}

fn run(command: Commands, settings: &Settings) -> Result<(), CliError> {
    match command {
        Commands::Mount { json } => commands::mount::run(settings, json),
        Commands::Ls { prefix, json } => commands::ls::run(settings, prefix.as_deref(), json),
        Commands::Which { name, json } => commands::which::run(settings, &name, json),
        Commands::Cat { name, output } => commands::cat::run(settings, &name, output.as_deref()),
        Commands::Probe { paths, list } => commands::probe::run(&paths, list),
        Commands::Config(command) => commands::config::run(command, settings),
    }
}

/// Report an unrecoverable error and exit with status 1.
///
/// The stderr layer is installed by now, so the event is the only output.
fn fatal(err: &CliError) -> ! {
    error!(error = %err, "Fatal error");
    process::exit(1);
}
