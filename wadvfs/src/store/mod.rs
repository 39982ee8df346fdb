//! Ordered storage for mounted devices.
//!
//! The [`DeviceStore`] owns every opened [`Device`] in the order it was
//! mounted. That order is the override precedence used by the merge: a device
//! mounted later shadows entries of the same name in earlier devices.
//!
//! The store holds the only strong reference to each device. Namespaces
//! built from the store keep weak references, so removing a device releases
//! its file handle or image immediately and leaves any old namespace stale
//! rather than dangling.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::device::Device;
use crate::loader::{LoaderRegistry, MountError};

/// Stable identifier of a device within one store.
///
/// Ids are never reused, even after a device is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(u32);

impl DeviceId {
    /// Raw numeric id.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// A device together with its id in the store.
#[derive(Debug, Clone)]
pub struct MountedDevice {
    /// Id assigned at mount time.
    pub id: DeviceId,

    /// The device itself.
    pub device: Arc<dyn Device>,
}

/// Devices in mount order.
#[derive(Debug, Default)]
pub struct DeviceStore {
    devices: Vec<MountedDevice>,
    next_id: u32,
    generation: u64,
}

impl DeviceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            next_id: 0,
            generation: 0,
        }
    }

    /// Append an opened device. It takes precedence over everything mounted before it.
    pub fn add(&mut self, device: Box<dyn Device>) -> DeviceId {
        let id = DeviceId(self.next_id);
        self.next_id += 1;
        self.generation += 1;

        info!(
            id = %id,
            device = device.label(),
            format = device.format(),
            entries = device.list().len(),
            position = self.devices.len(),
            "Added device to store"
        );

        self.devices.push(MountedDevice {
            id,
            device: Arc::from(device),
        });
        id
    }

    /// Open `path` through the registry and append the result.
    pub fn mount(
        &mut self,
        registry: &LoaderRegistry,
        path: impl AsRef<Path>,
    ) -> Result<DeviceId, MountError> {
        let device = registry.mount(path)?;
        Ok(self.add(device))
    }

    /// Remove a device, releasing its resources once no read is in flight.
    ///
    /// Returns `false` if the id is not in the store. Namespaces built before
    /// the removal become stale and should be rebuilt.
    pub fn remove(&mut self, id: DeviceId) -> bool {
        let Some(position) = self.position(id) else {
            return false;
        };
        let removed = self.devices.remove(position);
        self.generation += 1;

        info!(id = %id, device = removed.device.label(), "Removed device from store");
        true
    }

    /// Look up a device by id.
    pub fn get(&self, id: DeviceId) -> Option<&Arc<dyn Device>> {
        self.devices
            .iter()
            .find(|m| m.id == id)
            .map(|m| &m.device)
    }

    /// Precedence position of a device (0 = lowest).
    pub fn position(&self, id: DeviceId) -> Option<usize> {
        self.devices.iter().position(|m| m.id == id)
    }

    /// Iterate devices from lowest to highest precedence.
    pub fn iter(&self) -> impl Iterator<Item = &MountedDevice> {
        self.devices.iter()
    }

    /// Ids in mount order.
    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|m| m.id).collect()
    }

    /// Number of mounted devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether nothing is mounted.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Counter bumped on every add and remove.
    ///
    /// A namespace built at generation `g` is current only while the store
    /// is still at `g`.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
