// Hecaton Backend Layer - xinput
// Runs the xinput executable and collects its output

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{Backend, BackendError};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Backend talking to the X server through the `xinput` tool
#[derive(Debug, Clone)]
pub struct XInput {
    executable: PathBuf,
    timeout: Option<Duration>,
}

impl XInput {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: None,
        }
    }

    /// Kill calls that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn describe(&self, args: &[String]) -> String {
        let mut command = self.executable.display().to_string();
        for arg in args {
            command.push(' ');
            command.push_str(arg);
        }
        command
    }

    fn run(&self, args: &[String]) -> Result<String, BackendError> {
        let command = self.describe(args);
        log::debug!("running `{}`", command);

        let mut child = Command::new(&self.executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BackendError::Spawn {
                program: self.executable.display().to_string(),
                source,
            })?;

        // Drain both pipes on their own threads so a chatty child can't
        // block on a full pipe while we wait for it.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_reader = thread::spawn(move || drain(stdout));
        let stderr_reader = thread::spawn(move || drain(stderr));

        let status = self.wait(&mut child, &command)?;
        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(BackendError::Failed {
                command,
                status: status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        String::from_utf8(stdout).map_err(|_| BackendError::InvalidOutput { command })
    }

    fn wait(&self, child: &mut std::process::Child, command: &str) -> Result<ExitStatus, BackendError> {
        let spawn_error = |source| BackendError::Spawn {
            program: self.executable.display().to_string(),
            source,
        };

        let Some(timeout) = self.timeout else {
            return child.wait().map_err(spawn_error);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait().map_err(spawn_error)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!("`{}` timed out after {:?}, killed", command, timeout);
                return Err(BackendError::Timeout {
                    command: command.to_string(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf) {
            log::debug!("pipe read failed after {} bytes: {}", buf.len(), e);
        }
    }
    buf
}

impl Backend for XInput {
    fn enumerate(&self) -> Result<String, BackendError> {
        self.run(&["list".to_string()])
    }

    fn list_properties(&self, ids: &[u32]) -> Result<String, BackendError> {
        if ids.is_empty() {
            return Ok(String::new());
        }
        let mut args = vec!["list-props".to_string()];
        args.extend(ids.iter().map(u32::to_string));
        self.run(&args)
    }

    fn create_master(&self, name: &str) -> Result<(), BackendError> {
        self.run(&["create-master".to_string(), name.to_string()])
            .map(drop)
    }

    fn remove_master(&self, id: u32) -> Result<(), BackendError> {
        self.run(&["remove-master".to_string(), id.to_string()])
            .map(drop)
    }

    fn reattach(&self, slave: u32, master: u32) -> Result<(), BackendError> {
        self.run(&["reattach".to_string(), slave.to_string(), master.to_string()])
            .map(drop)
    }

    fn disable(&self, id: u32) -> Result<(), BackendError> {
        self.run(&["disable".to_string(), id.to_string()]).map(drop)
    }
}
