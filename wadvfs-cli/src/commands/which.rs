//! Which command - show which container supplies a name.

use console::style;

use super::{format_size, print_json};
use crate::error::CliError;
use crate::runner::{self, Settings};

/// Run the which command.
pub fn run(settings: &Settings, name: &str, json: bool) -> Result<(), CliError> {
    let outcome = runner::bootstrap(settings)?;
    let resolution = outcome.namespace.resolve(name)?;

    if json {
        return print_json(&resolution);
    }

    println!(
        "{} → {} ({}, {})",
        style(resolution.name).bold(),
        resolution.device_label,
        resolution.format,
        resolution.device
    );
    println!("  locator: {}", resolution.locator);
    println!("  size:    {}", format_size(resolution.size));
    Ok(())
}
