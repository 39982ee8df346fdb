//! Ls command - list merged names.

use console::style;

use super::{format_size, print_json};
use crate::error::CliError;
use crate::runner::{self, Settings};

/// Run the ls command.
pub fn run(settings: &Settings, prefix: Option<&str>, json: bool) -> Result<(), CliError> {
    let outcome = runner::bootstrap(settings)?;
    let entries = outcome.namespace.with_prefix(prefix.unwrap_or(""));

    if json {
        return print_json(&entries);
    }

    for entry in &entries {
        println!(
            "{:<40} {:>10}  {}",
            entry.name,
            format_size(entry.size),
            style(entry.device_label).dim()
        );
    }
    eprintln!("{} names", entries.len());
    Ok(())
}
