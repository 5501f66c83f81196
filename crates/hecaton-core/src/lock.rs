// Hecaton Invocation Lock
// Advisory file lock serializing concurrent hotplug handlers

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Exclusive `flock` held until dropped.
///
/// Two hotplug events firing together run as two processes; without the
/// lock both could miss an existing master and create it twice.
#[derive(Debug)]
pub struct MasterLock {
    file: File,
    path: PathBuf,
}

impl MasterLock {
    /// Block until the lock at `path` is ours
    pub fn acquire(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::lock(path.as_ref(), libc::LOCK_EX)
    }

    /// Take the lock only if nobody holds it
    pub fn try_acquire(path: impl AsRef<Path>) -> io::Result<Option<Self>> {
        match Self::lock(path.as_ref(), libc::LOCK_EX | libc::LOCK_NB) {
            Ok(lock) => Ok(Some(lock)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn lock(path: &Path, operation: libc::c_int) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        loop {
            // SAFETY: the descriptor stays open for the lifetime of `file`
            let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
            if rc == 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }

        log::trace!("acquired {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MasterLock {
    fn drop(&mut self) {
        // SAFETY: see `lock`; closing the file would release it as well
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}
