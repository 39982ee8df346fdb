//! Probe command - open containers without bootstrapping.
//!
//! Useful for checking which loader claims a file and what it exposes.

use std::path::{Path, PathBuf};

use console::style;
use wadvfs::{Device, LoaderRegistry};

use super::format_size;
use crate::error::CliError;

/// Run the probe command.
pub fn run(paths: &[PathBuf], list: bool) -> Result<(), CliError> {
    let registry = LoaderRegistry::with_defaults();

    // A single container reports its own error instead of a summary.
    if let [path] = paths {
        let device = registry.mount(path)?;
        print_device(path, device.as_ref(), list);
        return Ok(());
    }

    let mut failed = 0usize;

    for path in paths {
        match registry.mount(path) {
            Ok(device) => print_device(path, device.as_ref(), list),
            Err(e) => {
                failed += 1;
                println!("{} {}", style("✗").red(), e);
            }
        }
    }

    if failed > 0 {
        return Err(CliError::Usage(format!(
            "{} of {} containers could not be opened",
            failed,
            paths.len()
        )));
    }
    Ok(())
}

fn print_device(path: &Path, device: &dyn Device, list: bool) {
    println!(
        "{} {} [{}] {} entries",
        style("✓").green(),
        path.display(),
        device.format(),
        device.list().len()
    );
    if list {
        for entry in device.list() {
            println!(
                "    {:<32} {:>10}  {}",
                entry.name,
                format_size(entry.size),
                style(entry.locator).dim()
            );
        }
    }
}
