//! Cat command - write the bytes behind a name.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::CliError;
use crate::runner::{self, Settings};

/// Run the cat command. Writes to stdout unless `output` is given.
pub fn run(settings: &Settings, name: &str, output: Option<&Path>) -> Result<(), CliError> {
    let outcome = runner::bootstrap(settings)?;
    let bytes = outcome.namespace.read(name)?;

    match output {
        Some(path) => {
            fs::write(path, &bytes).map_err(|source| CliError::Output {
                path: path.to_path_buf(),
                source,
            })?;
            info!(name, path = %path.display(), bytes = bytes.len(), "Wrote entry");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&bytes)
                .and_then(|_| stdout.flush())
                .map_err(|source| CliError::Output {
                    path: PathBuf::from("<stdout>"),
                    source,
                })?;
        }
    }
    Ok(())
}
