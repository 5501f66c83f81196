// Hecaton Event Dispatch
// Maps XI2 hierarchy events to routing and master lifecycle actions

use std::str::FromStr;

use strum_macros::{AsRefStr, EnumString, IntoStaticStr};

use crate::backend::{Backend, BackendError};
use crate::device::{Device, Kind, TEST_DEVICE_MARKER};
use crate::master::{MasterError, MasterManager};
use crate::routing::RoutingPolicy;
use crate::snapshot::{DeviceRegistry, SnapshotError};

/// Device class sent with enable/disable events for master pointers
pub const MASTER_POINTER_CLASS: &str = "XIMasterPointer";
/// Device class sent with enable/disable events for master keyboards
pub const MASTER_KEYBOARD_CLASS: &str = "XIMasterKeyboard";
/// Device class of slave pointers; every other slave class is a keyboard
pub const SLAVE_POINTER_CLASS: &str = "XISlavePointer";

/// Events the dispatcher knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, IntoStaticStr)]
pub enum Event {
    XIDeviceEnabled,
    XIDeviceDisabled,
    XISlaveAdded,
    XISlaveRemoved,
    XIMasterAdded,
    XIMasterRemoved,
    XISlaveAttached,
    XISlaveDetached,
    #[strum(serialize = "listdevices")]
    ListDevices,
}

impl Event {
    pub fn parse(name: &str) -> Result<Self, EventError> {
        Event::from_str(name).map_err(|_| EventError::UnknownEvent(name.to_string()))
    }
}

/// Result type for event handling
pub type EventResult<T> = Result<T, EventError>;

/// Errors that fail the current event
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("no handler for event {0:?}")]
    UnknownEvent(String),

    #[error("{event} needs <device class> <device name> arguments")]
    MissingArguments { event: &'static str },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Master(#[from] MasterError),
}

/// Why a device was left alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    MasterDevice,
    TestDevice,
    NoMatchingGroup,
    UnknownDevice,
}

/// What handling an event did
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    Attached { group: String, master: u32 },
    Disabled,
    Pruned(Vec<u32>),
    CacheInvalidated,
    Nothing,
    Devices(Vec<Device>),
}

/// Handles one event per invocation
pub struct EventHandler<'a, B: Backend> {
    registry: &'a DeviceRegistry<B>,
    policy: &'a RoutingPolicy,
}

impl<'a, B: Backend> EventHandler<'a, B> {
    pub fn new(registry: &'a DeviceRegistry<B>, policy: &'a RoutingPolicy) -> Self {
        Self { registry, policy }
    }

    /// Dispatch `event` for `device_id`; `args` are the event's extra arguments
    pub fn handle(&self, event: Event, device_id: u32, args: &[String]) -> EventResult<Outcome> {
        match event {
            Event::XIDeviceEnabled => {
                let (class, name) = class_and_name(event, args)?;
                self.device_enabled(device_id, class, name)
            }
            Event::XIDeviceDisabled => {
                let (class, name) = class_and_name(event, args)?;
                self.device_disabled(device_id, class, name)
            }
            Event::XISlaveAdded
            | Event::XISlaveRemoved
            | Event::XIMasterAdded
            | Event::XIMasterRemoved => {
                self.registry.invalidate();
                Ok(Outcome::CacheInvalidated)
            }
            Event::XISlaveAttached | Event::XISlaveDetached => Ok(Outcome::Nothing),
            Event::ListDevices => Ok(Outcome::Devices(self.registry.snapshot()?.list().to_vec())),
        }
    }

    /// A slave appeared: route it and attach it to its group's master
    pub fn device_enabled(&self, device_id: u32, class: &str, name: &str) -> EventResult<Outcome> {
        if let Some(reason) = ignored(class, name) {
            return Ok(Outcome::Ignored(reason));
        }
        log::info!("XIDeviceEnabled({}, {:?}, {:?})", device_id, class, name);

        let group = match self.policy.fixed_group() {
            Some(group) => group,
            None => {
                let Some(device) = self.find_device(device_id)? else {
                    return Ok(Outcome::Ignored(IgnoreReason::UnknownDevice));
                };
                if self.policy.is_disabled(&device) {
                    log::info!("disabling {:?}", device.name);
                    self.registry.disable(device_id)?;
                    return Ok(Outcome::Disabled);
                }
                match self.policy.route(&device) {
                    Some(group) => group,
                    None => {
                        log::info!("no group for {:?}, leaving it alone", device.name);
                        return Ok(Outcome::Ignored(IgnoreReason::NoMatchingGroup));
                    }
                }
            }
        };

        let kind = if class == SLAVE_POINTER_CLASS {
            Kind::Pointer
        } else {
            Kind::Keyboard
        };
        let masters = MasterManager::new(self.registry);
        let master = masters.ensure_master(&group, kind)?;
        masters.attach(device_id, master)?;
        Ok(Outcome::Attached { group, master })
    }

    /// Look a device up, refetching once when a cached snapshot predates it
    fn find_device(&self, device_id: u32) -> EventResult<Option<Device>> {
        if let Ok(device) = self.registry.snapshot()?.by_id(device_id) {
            return Ok(Some(device.clone()));
        }
        if self.registry.has_cache() {
            log::debug!("device {} not in cached snapshot, refetching", device_id);
            if let Ok(device) = self.registry.refresh()?.by_id(device_id) {
                return Ok(Some(device.clone()));
            }
        }
        log::info!("ignoring device {}: not in the device list", device_id);
        Ok(None)
    }

    /// A slave went away: drop master pairs nobody uses anymore
    pub fn device_disabled(&self, device_id: u32, class: &str, name: &str) -> EventResult<Outcome> {
        if let Some(reason) = ignored(class, name) {
            return Ok(Outcome::Ignored(reason));
        }
        log::info!("XIDeviceDisabled({}, {:?}, {:?})", device_id, class, name);

        let removed = MasterManager::new(self.registry).prune_orphans()?;
        Ok(Outcome::Pruned(removed))
    }
}

fn class_and_name(event: Event, args: &[String]) -> EventResult<(&str, &str)> {
    match args {
        [class, name, ..] => Ok((class.as_str(), name.as_str())),
        _ => Err(EventError::MissingArguments {
            event: event.into(),
        }),
    }
}

/// Masters and XTEST devices are managed by the server itself
fn ignored(class: &str, name: &str) -> Option<IgnoreReason> {
    if class == MASTER_POINTER_CLASS || class == MASTER_KEYBOARD_CLASS {
        return Some(IgnoreReason::MasterDevice);
    }
    if name.contains(TEST_DEVICE_MARKER) {
        return Some(IgnoreReason::TestDevice);
    }
    None
}
