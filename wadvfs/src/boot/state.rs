//! The bootstrap state machine.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{BootError, DataFileFinder, RecoveryPrompt};
use crate::loader::LoaderRegistry;
use crate::namespace::{merge, Namespace};
use crate::store::{DeviceId, DeviceStore};

/// Default name of the base container.
pub const DEFAULT_BASE_CONTAINER: &str = "doom64.rom";

/// Default name of the supplemental container.
pub const DEFAULT_SUPPLEMENTAL_CONTAINER: &str = "doom64ex.pk3";

/// File names of the two containers every session needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredContainers {
    /// Base game data (the ROM).
    pub base: String,

    /// Supplemental data shipped with the engine (a PK3).
    pub supplemental: String,
}

impl RequiredContainers {
    /// Create with explicit names.
    pub fn new(base: impl Into<String>, supplemental: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            supplemental: supplemental.into(),
        }
    }
}

impl Default for RequiredContainers {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_CONTAINER, DEFAULT_SUPPLEMENTAL_CONTAINER)
    }
}

/// States of base container acquisition.
///
/// ```text
///              found + mounted
///  Searching ─────────────────────▶ Found
///     │  ▲
///     │  │ file installed
///     ▼  │
///  NeedsUserInput ──── cancel ────▶ Cancelled
///     │
///     └───── install failed ──────▶ Fatal
///
///  Searching ── missing, no prompt ─▶ Fatal
/// ```
#[derive(Debug)]
pub enum BaseState {
    /// Looking for the base container through the finder.
    Searching,

    /// The base container is missing or unusable; asking the user.
    NeedsUserInput {
        /// Why the search failed.
        reason: String,
    },

    /// The base container is mounted.
    Found(DeviceId),

    /// The user declined to pick a file.
    Cancelled,

    /// Acquisition failed for good.
    Fatal(BootError),
}

impl BaseState {
    /// Whether no further step is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BaseState::Found(_) | BaseState::Cancelled | BaseState::Fatal(_)
        )
    }
}

/// Everything a successful bootstrap produces.
#[derive(Debug)]
pub struct BootOutcome {
    /// All mounted devices, in precedence order.
    pub store: DeviceStore,

    /// The merged namespace over `store`.
    pub namespace: Namespace,

    /// Id of the base container.
    pub base: DeviceId,

    /// Id of the supplemental container.
    pub supplemental: DeviceId,

    /// Ids of extra patch containers, in mount order.
    pub extras: Vec<DeviceId>,
}

/// Drives startup: base container, supplemental container, patches, merge.
///
/// # Example
///
/// ```ignore
/// use wadvfs::boot::{Bootstrap, SearchPathFinder};
/// use wadvfs::loader::LoaderRegistry;
///
/// let registry = LoaderRegistry::with_defaults();
/// let finder = SearchPathFinder::new(["/games/doom64".into()]);
/// let outcome = Bootstrap::new(&registry, &finder).run()?;
/// println!("{} names", outcome.namespace.len());
/// ```
pub struct Bootstrap<'a> {
    registry: &'a LoaderRegistry,
    finder: &'a dyn DataFileFinder,
    recovery: Option<&'a dyn RecoveryPrompt>,
    containers: RequiredContainers,
    install_dir: Option<PathBuf>,
    extras: Vec<PathBuf>,
    installed: Option<PathBuf>,
    store: DeviceStore,
}

impl<'a> Bootstrap<'a> {
    /// Create a bootstrap with default container names and no recovery.
    pub fn new(registry: &'a LoaderRegistry, finder: &'a dyn DataFileFinder) -> Self {
        Self {
            registry,
            finder,
            recovery: None,
            containers: RequiredContainers::default(),
            install_dir: None,
            extras: Vec::new(),
            installed: None,
            store: DeviceStore::new(),
        }
    }

    /// Use different required container names.
    pub fn with_containers(mut self, containers: RequiredContainers) -> Self {
        self.containers = containers;
        self
    }

    /// Enable interactive recovery of a missing base container.
    pub fn with_recovery(mut self, prompt: &'a dyn RecoveryPrompt) -> Self {
        self.recovery = Some(prompt);
        self
    }

    /// Directory that receives a recovered base container.
    ///
    /// Defaults to the current directory.
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    /// Patch containers to mount after the required ones, lowest precedence first.
    pub fn with_extra_containers(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.extras.extend(paths);
        self
    }

    /// Required container names in use.
    pub fn containers(&self) -> &RequiredContainers {
        &self.containers
    }

    /// Devices mounted so far.
    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    /// Advance base acquisition by one transition.
    ///
    /// Terminal states are returned unchanged.
    pub fn step(&mut self, state: BaseState) -> BaseState {
        match state {
            BaseState::Searching => self.search_base(),
            BaseState::NeedsUserInput { reason } => self.ask_user(&reason),
            terminal => terminal,
        }
    }

    /// Run the whole sequence.
    ///
    /// # Errors
    ///
    /// Returns [`BootError::Cancelled`] when the user declines recovery and a
    /// fatal [`BootError`] for every other failure. Nothing is merged unless
    /// all required containers and patches mounted.
    pub fn run(mut self) -> Result<BootOutcome, BootError> {
        let mut state = BaseState::Searching;
        let base = loop {
            state = match self.step(state) {
                BaseState::Found(id) => break id,
                BaseState::Cancelled => {
                    info!("Base container selection cancelled");
                    return Err(BootError::Cancelled);
                }
                BaseState::Fatal(err) => return Err(err),
                next => next,
            };
        };

        let supplemental = self.mount_supplemental()?;

        let mut extras = Vec::with_capacity(self.extras.len());
        for path in std::mem::take(&mut self.extras) {
            let id = self
                .store
                .mount(self.registry, &path)
                .map_err(|source| BootError::Mount {
                    path: path.clone(),
                    source,
                })?;
            extras.push(id);
        }

        let namespace = merge(&self.store);
        info!(
            devices = self.store.len(),
            names = namespace.len(),
            "Bootstrap complete"
        );

        Ok(BootOutcome {
            store: self.store,
            namespace,
            base,
            supplemental,
            extras,
        })
    }

    fn search_base(&mut self) -> BaseState {
        let name = self.containers.base.clone();
        // A freshly installed selection is tried before searching again.
        let located = self
            .installed
            .take()
            .or_else(|| self.finder.find_data_file(&name));

        let failure = match located {
            Some(path) => match self.store.mount(self.registry, &path) {
                Ok(id) => {
                    info!(name = %name, path = %path.display(), "Base container mounted");
                    return BaseState::Found(id);
                }
                Err(source) => {
                    warn!(name = %name, error = %source, "Base container could not be mounted");
                    BootError::Mount { path, source }
                }
            },
            None => BootError::MissingRequiredContainer {
                name: name.clone(),
                reason: "not found in any search directory".to_string(),
            },
        };

        if self.recovery.is_some() {
            BaseState::NeedsUserInput {
                reason: failure.to_string(),
            }
        } else {
            BaseState::Fatal(failure)
        }
    }

    fn ask_user(&mut self, reason: &str) -> BaseState {
        let Some(prompt) = self.recovery else {
            return BaseState::Fatal(BootError::MissingRequiredContainer {
                name: self.containers.base.clone(),
                reason: reason.to_string(),
            });
        };

        warn!(reason, "Asking user to locate base container");
        let Some(selected) = prompt.select_file(&self.containers.base) else {
            return BaseState::Cancelled;
        };

        match self.install(&selected) {
            Ok(installed) => {
                self.installed = Some(installed);
                BaseState::Searching
            }
            Err(err) => BaseState::Fatal(err),
        }
    }

    /// Copy a user-selected file into the install directory under the
    /// expected base container name.
    fn install(&self, from: &Path) -> Result<PathBuf, BootError> {
        let dir = match &self.install_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|source| BootError::Install {
                from: from.to_path_buf(),
                to: PathBuf::from(&self.containers.base),
                source,
            })?,
        };
        let to = dir.join(&self.containers.base);
        let install_error = |source| BootError::Install {
            from: from.to_path_buf(),
            to: to.clone(),
            source,
        };

        if same_file(from, &to) {
            return Ok(to);
        }

        fs::create_dir_all(&dir).map_err(install_error)?;
        let bytes = fs::copy(from, &to).map_err(install_error)?;
        info!(
            from = %from.display(),
            to = %to.display(),
            bytes,
            "Installed base container"
        );
        Ok(to)
    }

    fn mount_supplemental(&mut self) -> Result<DeviceId, BootError> {
        let name = self.containers.supplemental.clone();
        let path = self
            .finder
            .find_data_file(&name)
            .ok_or_else(|| BootError::MissingRequiredContainer {
                name: name.clone(),
                reason: "not found in any search directory".to_string(),
            })?;

        let id = self
            .store
            .mount(self.registry, &path)
            .map_err(|source| BootError::Mount {
                path: path.clone(),
                source,
            })?;
        info!(name = %name, path = %path.display(), "Supplemental container mounted");
        Ok(id)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
