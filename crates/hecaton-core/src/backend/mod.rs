// Hecaton Backend Layer
// Access to the X server's device table through an external tool

mod xinput;

#[cfg(test)]
pub(crate) mod fake;

pub use xinput::XInput;

use std::time::Duration;

/// Errors from a backend call
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` produced non UTF-8 output")]
    InvalidOutput { command: String },
}

/// Operations the engine needs from the device-management backend.
///
/// Queries return the backend's raw text; parsing lives in the snapshot
/// module. Mutations are fire-and-forget: success means the backend
/// accepted the request.
pub trait Backend {
    /// Dump the hierarchical device list
    fn enumerate(&self) -> Result<String, BackendError>;

    /// Dump the properties of every device in `ids`, in order
    fn list_properties(&self, ids: &[u32]) -> Result<String, BackendError>;

    /// Create a master pair; the server appends " pointer"/" keyboard"
    fn create_master(&self, name: &str) -> Result<(), BackendError>;

    /// Remove the master pair containing `id`
    fn remove_master(&self, id: u32) -> Result<(), BackendError>;

    /// Attach a slave device to a master
    fn reattach(&self, slave: u32, master: u32) -> Result<(), BackendError>;

    /// Disable a device so it produces no events
    fn disable(&self, id: u32) -> Result<(), BackendError>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn enumerate(&self) -> Result<String, BackendError> {
        (**self).enumerate()
    }

    fn list_properties(&self, ids: &[u32]) -> Result<String, BackendError> {
        (**self).list_properties(ids)
    }

    fn create_master(&self, name: &str) -> Result<(), BackendError> {
        (**self).create_master(name)
    }

    fn remove_master(&self, id: u32) -> Result<(), BackendError> {
        (**self).remove_master(id)
    }

    fn reattach(&self, slave: u32, master: u32) -> Result<(), BackendError> {
        (**self).reattach(slave, master)
    }

    fn disable(&self, id: u32) -> Result<(), BackendError> {
        (**self).disable(id)
    }
}
