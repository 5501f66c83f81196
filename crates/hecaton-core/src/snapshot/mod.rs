// Hecaton Device Snapshot
// Point-in-time view of the server's devices, and the registry that builds it

mod cache;
mod parse;
mod sysfs;

pub use cache::SnapshotCache;
pub use parse::{parse_device_line, parse_device_list, parse_properties, parse_value};
pub use sysfs::{resolve_system_path, SYSFS_INPUT_CLASS};

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::backend::{Backend, BackendError};
use crate::device::{master_name, Device, Kind, Properties, Role};

/// A lookup that found nothing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("device {0} not found")]
    DeviceNotFound(u32),
}

/// Errors building a snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("cannot enumerate devices: {0}")]
    Backend(#[from] BackendError),
}

/// All devices visible at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    devices: Vec<Device>,
}

impl Snapshot {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    pub fn list(&self) -> &[Device] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn by_id(&self, id: u32) -> Result<&Device, LookupError> {
        self.devices
            .iter()
            .find(|device| device.id == id)
            .ok_or(LookupError::DeviceNotFound(id))
    }

    /// Devices partitioned by name; group order is unspecified
    pub fn grouped_by_name(&self) -> HashMap<&str, Vec<&Device>> {
        let mut groups: HashMap<&str, Vec<&Device>> = HashMap::new();
        for device in &self.devices {
            groups.entry(device.name.as_str()).or_default().push(device);
        }
        groups
    }

    /// Id of the master created for `group`, if it exists
    pub fn find_master(&self, group: &str, kind: Kind) -> Option<u32> {
        let name = master_name(group, kind);
        self.grouped_by_name()
            .get(name.as_str())?
            .iter()
            .find(|device| device.role == Role::Master && device.kind == kind)
            .map(|device| device.id)
    }
}

/// Give each device its `list-props` block.
///
/// Blocks follow the id batch, so they pair up by position. When the counts
/// differ a device changed in between; blocks are then paired by label, and
/// only when the label names exactly one block and one device.
fn attach_properties(devices: &mut [Device], blocks: Vec<(String, Properties)>) {
    if blocks.len() == devices.len() {
        for (device, (_, properties)) in devices.iter_mut().zip(blocks) {
            device.properties = properties;
        }
        return;
    }

    log::warn!(
        "{} property blocks for {} devices, pairing them by name",
        blocks.len(),
        devices.len()
    );
    let mut device_names: HashMap<String, usize> = HashMap::new();
    for device in devices.iter() {
        *device_names.entry(device.name.clone()).or_default() += 1;
    }
    let mut by_label: HashMap<String, Vec<Properties>> = HashMap::new();
    for (label, properties) in blocks {
        by_label.entry(label).or_default().push(properties);
    }

    for device in devices.iter_mut() {
        if device_names.get(&device.name) != Some(&1) {
            log::debug!("{:?} is not unique, leaving it without properties", device.name);
            continue;
        }
        match by_label.remove(&device.name) {
            Some(mut found) if found.len() == 1 => device.properties = found.remove(0),
            _ => log::debug!("no unique property block for {:?}", device.name),
        }
    }
}

/// Builds snapshots from a backend and owns every mutation of the device
/// table, so that each mutation drops the cached snapshot.
pub struct DeviceRegistry<B: Backend> {
    backend: B,
    cache: Option<SnapshotCache>,
    sysfs_root: PathBuf,
}

impl<B: Backend> DeviceRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: None,
            sysfs_root: PathBuf::from(SYSFS_INPUT_CLASS),
        }
    }

    pub fn with_cache(mut self, cache: Option<SnapshotCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    /// Whether snapshots may come from an earlier invocation
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Current snapshot, served from the cache when one is stored
    pub fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        if let Some(snapshot) = self.cache.as_ref().and_then(SnapshotCache::load) {
            log::trace!("using cached snapshot ({} devices)", snapshot.len());
            return Ok(snapshot);
        }
        self.refresh()
    }

    /// Query the backend, bypassing and then replacing the cache
    pub fn refresh(&self) -> Result<Snapshot, SnapshotError> {
        let snapshot = self.fetch()?;
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(&snapshot) {
                log::warn!("cannot write snapshot cache {}: {}", cache.path().display(), e);
            }
        }
        Ok(snapshot)
    }

    fn fetch(&self) -> Result<Snapshot, SnapshotError> {
        let listing = self.backend.enumerate()?;
        let mut devices = parse_device_list(&listing);
        let ids: Vec<u32> = devices.iter().map(|device| device.id).collect();

        // A device vanishing between the two calls makes list-props fail;
        // names alone are still enough to route.
        match self.backend.list_properties(&ids) {
            Ok(text) => attach_properties(&mut devices, parse_properties(&text)),
            Err(e) => log::warn!("device properties unavailable: {}", e),
        }

        for device in &mut devices {
            let path = device
                .device_node()
                .and_then(|node| resolve_system_path(&self.sysfs_root, node));
            device.system_path = path;
        }

        log::debug!("fetched snapshot with {} devices", devices.len());
        Ok(Snapshot::new(devices))
    }

    /// Drop the cached snapshot; safe without one
    pub fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate();
        }
    }

    pub fn create_master(&self, name: &str) -> Result<(), BackendError> {
        let result = self.backend.create_master(name);
        self.invalidate();
        result
    }

    pub fn remove_master(&self, id: u32) -> Result<(), BackendError> {
        let result = self.backend.remove_master(id);
        self.invalidate();
        result
    }

    pub fn disable(&self, id: u32) -> Result<(), BackendError> {
        let result = self.backend.disable(id);
        self.invalidate();
        result
    }

    /// Attach a slave; the set of masters is unchanged, so the cache stays
    pub fn reattach(&self, slave: u32, master: u32) -> Result<(), BackendError> {
        self.backend.reattach(slave, master)
    }
}
