//! Mount command - run the startup sequence and report what was mounted.

use console::style;
use serde::Serialize;
use wadvfs::boot::BootOutcome;

use super::print_json;
use crate::error::CliError;
use crate::runner::{self, Settings};

#[derive(Serialize)]
struct DeviceReport<'a> {
    position: usize,
    id: wadvfs::DeviceId,
    role: &'static str,
    format: &'static str,
    label: &'a str,
    path: String,
    entries: usize,
    owned: usize,
}

#[derive(Serialize)]
struct MountReport<'a> {
    devices: Vec<DeviceReport<'a>>,
    names: usize,
    shadowed: usize,
}

/// Run the mount command.
pub fn run(settings: &Settings, json: bool) -> Result<(), CliError> {
    let outcome = runner::bootstrap(settings)?;
    let report = build_report(&outcome);

    if json {
        return print_json(&report);
    }

    println!("{}", style("Mounted containers (lowest precedence first)").bold());
    println!();
    for device in &report.devices {
        println!(
            "  {:>2}  {:<12} {:<4} {:<24} {:>6} entries, {:>6} visible",
            device.position,
            style(device.role).cyan(),
            device.format,
            device.label,
            device.entries,
            device.owned
        );
        println!("      {}", style(&device.path).dim());
    }
    println!();
    println!(
        "{} {} names, {} overridden",
        style("✓").green(),
        report.names,
        report.shadowed
    );
    Ok(())
}

fn build_report(outcome: &BootOutcome) -> MountReport<'_> {
    let owned = outcome.namespace.devices();
    let devices = outcome
        .store
        .iter()
        .enumerate()
        .map(|(position, mounted)| {
            let role = if mounted.id == outcome.base {
                "base"
            } else if mounted.id == outcome.supplemental {
                "supplemental"
            } else {
                "patch"
            };
            DeviceReport {
                position,
                id: mounted.id,
                role,
                format: mounted.device.format(),
                label: mounted.device.label(),
                path: mounted.device.path().display().to_string(),
                entries: mounted.device.list().len(),
                owned: owned
                    .iter()
                    .find(|d| d.id == mounted.id)
                    .map(|d| d.owned)
                    .unwrap_or(0),
            }
        })
        .collect();

    MountReport {
        devices,
        names: outcome.namespace.len(),
        shadowed: outcome.namespace.shadowed_count(),
    }
}
