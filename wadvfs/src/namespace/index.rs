//! The merged name → entry table and its lookup API.

use std::collections::{BTreeMap, HashMap};
use std::sync::Weak;

use bytes::Bytes;
use serde::Serialize;

use super::LookupError;
use crate::device::{normalize_name, Device, Locator, ReadError};
use crate::store::{DeviceId, DeviceStore};

/// Non-owning reference to a device in the store.
#[derive(Debug, Clone)]
pub(super) struct DeviceRef {
    pub id: DeviceId,
    pub label: String,
    pub format: &'static str,
    pub device: Weak<dyn Device>,
}

/// Owner and location of one merged name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Slot {
    /// Index into `Namespace::devices`.
    pub device: usize,
    pub locator: Locator,
    pub size: u64,
}

/// Result of resolving a logical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution<'a> {
    /// Normalized logical name.
    pub name: &'a str,

    /// Device that supplies the name.
    pub device: DeviceId,

    /// Label of that device.
    pub device_label: &'a str,

    /// Format of that device.
    pub format: &'static str,

    /// Where the bytes live inside the device.
    pub locator: Locator,

    /// Stored size in bytes.
    pub size: u64,
}

/// Summary of one device as seen by the namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceDevice<'a> {
    /// Device id in the store.
    pub id: DeviceId,

    /// Device label.
    pub label: &'a str,

    /// Format name.
    pub format: &'static str,

    /// Number of names this device currently supplies.
    pub owned: usize,
}

/// Flat, immutable view of every logical name across all mounted devices.
///
/// Built by [`merge`](super::merge). Lookups are plain hash map reads, so a
/// published namespace can be shared across threads freely.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    pub(super) slots: HashMap<String, Slot>,
    pub(super) devices: Vec<DeviceRef>,
    pub(super) generation: u64,
    pub(super) shadowed: usize,
}

impl Namespace {
    /// Resolve a logical name to its owning device and locator.
    pub fn resolve(&self, name: &str) -> Result<Resolution<'_>, LookupError> {
        let key = normalize_name(name);
        let (name, slot) = self
            .slots
            .get_key_value(&key)
            .ok_or(LookupError::NotFound(key))?;
        Ok(self.resolution(name, slot))
    }

    /// Read the bytes behind a logical name from its owning device.
    ///
    /// Unknown names fail with [`LookupError::NotFound`] before any device is
    /// touched.
    pub fn read(&self, name: &str) -> Result<Bytes, LookupError> {
        let key = normalize_name(name);
        let Some(slot) = self.slots.get(&key) else {
            return Err(LookupError::NotFound(key));
        };

        let owner = &self.devices[slot.device];
        let device = owner.device.upgrade().ok_or_else(|| LookupError::Read {
            name: key.clone(),
            source: ReadError::DeviceUnmounted(owner.label.clone()),
        })?;

        device
            .read(&slot.locator)
            .map_err(|source| LookupError::Read { name: key, source })
    }

    /// Check whether a logical name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(&normalize_name(name))
    }

    /// Number of distinct logical names.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the namespace has no names.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Iterate all resolutions, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = Resolution<'_>> {
        self.slots
            .iter()
            .map(move |(name, slot)| self.resolution(name, slot))
    }

    /// Resolutions for every name under a logical directory, sorted by name.
    ///
    /// An empty prefix returns everything.
    pub fn with_prefix(&self, prefix: &str) -> Vec<Resolution<'_>> {
        let prefix = normalize_name(prefix);
        let mut found: Vec<Resolution<'_>> = self
            .iter()
            .filter(|r| {
                prefix.is_empty()
                    || r.name
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .collect();
        found.sort_unstable_by(|a, b| a.name.cmp(b.name));
        found
    }

    /// Number of entries that were overridden by a later device during merge.
    pub fn shadowed_count(&self) -> usize {
        self.shadowed
    }

    /// Devices that took part in the merge, lowest precedence first.
    pub fn devices(&self) -> Vec<NamespaceDevice<'_>> {
        let mut owned = vec![0usize; self.devices.len()];
        for slot in self.slots.values() {
            owned[slot.device] += 1;
        }
        self.devices
            .iter()
            .zip(owned)
            .map(|(d, owned)| NamespaceDevice {
                id: d.id,
                label: &d.label,
                format: d.format,
                owned,
            })
            .collect()
    }

    /// Store generation this namespace was built from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the store changed since this namespace was built.
    pub fn is_stale(&self, store: &DeviceStore) -> bool {
        self.generation != store.generation()
    }

    /// Ordered copy of the name → (device, locator) table.
    pub fn snapshot(&self) -> BTreeMap<String, (DeviceId, Locator)> {
        self.slots
            .iter()
            .map(|(name, slot)| (name.clone(), (self.devices[slot.device].id, slot.locator)))
            .collect()
    }

    fn resolution<'a>(&'a self, name: &'a str, slot: &Slot) -> Resolution<'a> {
        let owner = &self.devices[slot.device];
        Resolution {
            name,
            device: owner.id,
            device_label: &owner.label,
            format: owner.format,
            locator: slot.locator,
            size: slot.size,
        }
    }
}
