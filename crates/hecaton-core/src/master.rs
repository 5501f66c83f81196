// Hecaton Master Lifecycle
// Ensures master pairs exist, attaches slaves, prunes orphaned pairs

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::backend::{Backend, BackendError};
use crate::device::{master_name, Kind};
use crate::snapshot::{DeviceRegistry, SnapshotError};

/// Name prefix of the server's built-in pair, which can't be removed
const CORE_PAIR_PREFIX: &str = "Virtual core";

/// Errors from master management
#[derive(Debug, thiserror::Error)]
pub enum MasterError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("master {0:?} missing after create-master")]
    NotCreated(String),
}

/// Master pair management on top of a device registry
pub struct MasterManager<'a, B: Backend> {
    registry: &'a DeviceRegistry<B>,
}

impl<'a, B: Backend> MasterManager<'a, B> {
    pub fn new(registry: &'a DeviceRegistry<B>) -> Self {
        Self { registry }
    }

    /// Id of the `kind` master of `group`, creating the pair if needed.
    ///
    /// After a create the lookup runs again on a fresh snapshot, so a pair
    /// created meanwhile by another invocation is found rather than
    /// duplicated.
    pub fn ensure_master(&self, group: &str, kind: Kind) -> Result<u32, MasterError> {
        if let Some(id) = self.registry.snapshot()?.find_master(group, kind) {
            log::debug!("found master {:?} as {}", master_name(group, kind), id);
            return Ok(id);
        }

        log::info!("creating master pair {:?}", group);
        self.registry.create_master(group)?;

        self.registry
            .refresh()?
            .find_master(group, kind)
            .ok_or_else(|| MasterError::NotCreated(master_name(group, kind)))
    }

    pub fn attach(&self, slave: u32, master: u32) -> Result<(), MasterError> {
        log::info!("attaching device {} to master {}", slave, master);
        self.registry.reattach(slave, master)?;
        Ok(())
    }

    /// Remove master pairs left with nothing but their XTEST devices.
    ///
    /// Each master counts the slaves attached to it, the XTEST device
    /// included. A master with at most one is a candidate, and is removed
    /// only when its sibling is a candidate too. Returns the removed ids.
    pub fn prune_orphans(&self) -> Result<Vec<u32>, MasterError> {
        let snapshot = self.registry.refresh()?;

        let mut masters: BTreeMap<u32, u32> = BTreeMap::new();
        let mut protected: HashSet<u32> = HashSet::new();
        let mut usage: HashMap<u32, usize> = HashMap::new();
        for device in snapshot.list() {
            if device.is_master() {
                masters.insert(device.id, device.pair);
                if device.name.starts_with(CORE_PAIR_PREFIX) {
                    protected.insert(device.id);
                }
            } else {
                *usage.entry(device.pair).or_default() += 1;
            }
        }
        let used = |id: &u32| usage.get(id).copied().unwrap_or(0);

        let mut removed = Vec::new();
        for (&id, &other) in &masters {
            if used(&id) > 1 || protected.contains(&id) {
                continue;
            }
            if used(&other) > 1 {
                log::debug!("keeping master {}: sibling {} still in use", id, other);
                continue;
            }

            log::info!("removing unused master {}", id);
            match self.registry.remove_master(id) {
                Ok(()) => removed.push(id),
                // The server drops both halves of a pair at once
                Err(e) if removed.contains(&other) => {
                    log::debug!("master {} already gone with {}: {}", id, other, e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(removed)
    }
}
