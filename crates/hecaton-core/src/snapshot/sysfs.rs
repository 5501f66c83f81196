// Hecaton Snapshot - sysfs resolution
// Maps an evdev node to the physical device it belongs to

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the input device class links
pub const SYSFS_INPUT_CLASS: &str = "/sys/class/input";

/// Resolve the physical location of the device behind `node`.
///
/// `<class_root>/<node name>` is a symlink into the device tree, e.g.
/// `/sys/devices/pci0000:00/.../0003:046D:C52B.0001/input/input12/event7`.
/// The physical device is the parent of the nearest `input` directory.
pub fn resolve_system_path(class_root: &Path, node: &str) -> Option<PathBuf> {
    let name = Path::new(node).file_name()?;
    let link = class_root.join(name);
    let resolved = match fs::canonicalize(&link) {
        Ok(resolved) => resolved,
        Err(e) => {
            log::debug!("cannot resolve {}: {}", link.display(), e);
            return None;
        }
    };

    let physical = resolved
        .ancestors()
        .find(|ancestor| ancestor.file_name() == Some(OsStr::new("input")))
        .and_then(Path::parent)
        .map(Path::to_path_buf);
    Some(physical.unwrap_or(resolved))
}
