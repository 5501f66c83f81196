// Hecaton Snapshot Cache
// Device snapshot persisted between invocations until a mutation invalidates it

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::Snapshot;

const CACHE_FILE: &str = "devices.json";

/// On-disk cache for the last device snapshot.
///
/// Between hotplug events the device table only changes through our own
/// mutations, so a snapshot stays valid until `invalidate()` is called.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    /// Cache stored as `devices.json` inside `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CACHE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached snapshot. Missing or unreadable files are a miss.
    pub fn load(&self) -> Option<Snapshot> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::debug!("snapshot cache {} unreadable: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log::debug!("snapshot cache {} corrupt, ignoring: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Persist a snapshot.
    ///
    /// Written to a temporary file and renamed so concurrent readers never
    /// see a partial file.
    pub fn store(&self, snapshot: &Snapshot) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string(snapshot).map_err(io::Error::other)?;
        let tmp = self.path.with_extension(format!("json.{}.tmp", std::process::id()));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }

    /// Drop the cached snapshot, if any
    pub fn invalidate(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::trace!("snapshot cache invalidated"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("cannot remove snapshot cache {}: {}", self.path.display(), e),
        }
    }
}
