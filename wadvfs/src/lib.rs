//! wadvfs - layered asset filesystem for a Doom 64 engine
//!
//! This library merges game data from several container formats into one
//! addressable namespace. Containers are opened by pluggable loaders, kept in
//! mount order by a [`store::DeviceStore`], and flattened by the merge engine
//! into a [`namespace::Namespace`] where later mounts override earlier ones.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   mount(path)   ┌──────────────┐
//! │  LoaderRegistry  │ ──────────────► │    Device    │  (PK3 / WAD / ROM)
//! │ [pk3, wad, rom]  │                 └──────┬───────┘
//! └──────────────────┘                        │ append
//!                                             ▼
//!                                    ┌──────────────────┐
//!                                    │   DeviceStore    │  mount order = precedence
//!                                    └────────┬─────────┘
//!                                             │ merge()
//!                                             ▼
//!                                    ┌──────────────────┐
//!                                    │    Namespace     │  name → (device, locator)
//!                                    └──────────────────┘
//! ```
//!
//! The [`boot`] module drives the whole sequence for the engine: it finds the
//! base ROM and the engine PK3, mounts them, and merges.
//!
//! # Example
//!
//! ```ignore
//! use wadvfs::loader::LoaderRegistry;
//! use wadvfs::namespace::Namespace;
//! use wadvfs::store::DeviceStore;
//!
//! let registry = LoaderRegistry::with_defaults();
//! let mut store = DeviceStore::new();
//! store.mount(&registry, "doom64.rom")?;
//! store.mount(&registry, "doom64ex.pk3")?;
//!
//! let namespace = Namespace::build(&store);
//! let playpal = namespace.read("playpal")?;
//! ```

pub mod boot;
pub mod config;
pub mod device;
pub mod loader;
pub mod logging;
pub mod namespace;
pub mod store;

/// Library version, taken from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use boot::{BootError, BootOutcome, Bootstrap};
pub use device::{Device, Entry, Locator, ReadError};
pub use loader::{Loader, LoaderRegistry, MountError};
pub use namespace::{merge, LookupError, Namespace};
pub use store::{DeviceId, DeviceStore};
