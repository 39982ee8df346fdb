//! Terminal prompt for recovering a missing base container.

use std::path::PathBuf;

use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use tracing::warn;
use wadvfs::boot::RecoveryPrompt;
use wadvfs::config::expand_tilde;

/// Asks on the terminal for a ROM dump to use as the base container.
///
/// An empty answer cancels.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    /// Whether a terminal is attached to stdin.
    pub fn available() -> bool {
        atty::is(atty::Stream::Stdin)
    }
}

impl RecoveryPrompt for TerminalPrompt {
    fn select_file(&self, wanted: &str) -> Option<PathBuf> {
        eprintln!();
        eprintln!(
            "{} {} could not be found or opened.",
            style("!").yellow().bold(),
            style(wanted).bold()
        );
        eprintln!("Enter the path to your Doom 64 ROM dump (.z64, .v64 or .n64).");
        eprintln!("It will be copied and used from now on. Leave empty to quit.");

        loop {
            let answer: String = match Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt("ROM path")
                .allow_empty(true)
                .interact_text()
            {
                Ok(answer) => answer,
                Err(e) => {
                    warn!(error = %e, "Prompt failed");
                    return None;
                }
            };

            let answer = answer.trim().trim_matches('"');
            if answer.is_empty() {
                return None;
            }

            let path = expand_tilde(answer);
            if path.is_file() {
                return Some(path);
            }
            eprintln!("{} {} is not a file", style("✗").red(), path.display());
        }
    }
}
