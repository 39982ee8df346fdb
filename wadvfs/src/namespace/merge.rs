//! Merge engine: flatten a device store into a namespace.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::index::{DeviceRef, Namespace, Slot};
use crate::store::DeviceStore;

/// Build a namespace from every device in `store`.
///
/// Devices are visited in mount order and each entry overwrites any earlier
/// entry of the same name, so the last-mounted device wins every collision.
/// Mount order is the only precedence input.
pub fn merge(store: &DeviceStore) -> Namespace {
    let mut slots: HashMap<String, Slot> = HashMap::new();
    let mut devices = Vec::with_capacity(store.len());
    let mut shadowed = 0usize;

    for (position, mounted) in store.iter().enumerate() {
        let device = &mounted.device;
        devices.push(DeviceRef {
            id: mounted.id,
            label: device.label().to_string(),
            format: device.format(),
            device: Arc::downgrade(device),
        });

        for entry in device.list() {
            let slot = Slot {
                device: position,
                locator: entry.locator,
                size: entry.size,
            };
            match slots.entry(entry.name.clone()) {
                MapEntry::Occupied(mut existing) => {
                    debug!(
                        name = %entry.name,
                        shadowed = %devices[existing.get().device].label,
                        by = device.label(),
                        "Entry overridden"
                    );
                    existing.insert(slot);
                    shadowed += 1;
                }
                MapEntry::Vacant(vacant) => {
                    vacant.insert(slot);
                }
            }
        }
    }

    info!(
        devices = devices.len(),
        names = slots.len(),
        shadowed,
        generation = store.generation(),
        "Merged namespace"
    );

    Namespace {
        slots,
        devices,
        generation: store.generation(),
        shadowed,
    }
}

impl Namespace {
    /// Build a namespace from a store. Same as [`merge`].
    pub fn build(store: &DeviceStore) -> Self {
        merge(store)
    }
}
