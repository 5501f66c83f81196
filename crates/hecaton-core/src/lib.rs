// Hecaton Core Library
// Groups hotplugged input devices into XInput master pairs

pub mod backend;
pub mod config;
pub mod device;
pub mod event;
pub mod lock;
pub mod master;
pub mod matcher;
pub mod routing;
pub mod settings;
pub mod snapshot;

pub use backend::{Backend, BackendError, XInput};
pub use config::{ConfigError, RuleSet, RuleViolation};
pub use device::{Device, Kind, Properties, PropertyValue, Role};
pub use event::{Event, EventError, EventHandler, EventResult, IgnoreReason, Outcome};
pub use lock::MasterLock;
pub use master::{MasterError, MasterManager};
pub use matcher::{matches, GlobPattern};
pub use routing::{time_bucket_name, RoutingPolicy};
pub use settings::{Settings, SettingsError};
pub use snapshot::{DeviceRegistry, LookupError, Snapshot, SnapshotCache, SnapshotError};

/// Registry wired from runtime settings: xinput backend with its call
/// timeout, snapshot cache when enabled, and the sysfs root.
pub fn registry_from_settings(settings: &Settings) -> DeviceRegistry<XInput> {
    let backend = XInput::new(&settings.xinput_path).with_timeout(settings.call_timeout);
    DeviceRegistry::new(backend)
        .with_cache(settings.cache_dir.as_ref().map(SnapshotCache::new))
        .with_sysfs_root(&settings.sysfs_root)
}
