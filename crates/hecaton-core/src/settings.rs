// Hecaton Settings
// Runtime configuration handed to every component at construction

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;

use crate::snapshot::SYSFS_INPUT_CLASS;

/// Default xinput location, usable under restricted environments
pub const DEFAULT_XINPUT: &str = "/usr/bin/xinput";
/// Default lag window in minutes
pub const DEFAULT_LAG_MINUTES: u32 = 2;
/// Default backend call timeout
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime settings.
///
/// Built from defaults, then the `[General]` rule table, then the
/// environment, then command line flags (in the binary).
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Path to the xinput executable
    pub xinput_path: PathBuf,

    /// Minutes during which new devices share a time-bucket master.
    ///
    /// With 2, devices plugged at 10:00 and 10:01 share a pair; a device
    /// plugged at 10:02 gets a new one.
    pub lag_minutes: u32,

    /// Suppress event logging
    pub quiet: bool,

    /// Directory for the snapshot cache and lock file; `None` disables caching
    pub cache_dir: Option<PathBuf>,

    /// Directory holding the input class links
    pub sysfs_root: PathBuf,

    /// Upper bound for one backend call
    pub call_timeout: Option<Duration>,
}

/// Errors that can occur when building settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid setting value: {0}")]
    InvalidValue(String),
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    pub fn new() -> Self {
        Self {
            xinput_path: PathBuf::from(DEFAULT_XINPUT),
            lag_minutes: DEFAULT_LAG_MINUTES,
            quiet: false,
            cache_dir: Some(default_cache_dir()),
            sysfs_root: PathBuf::from(SYSFS_INPUT_CLASS),
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
        }
    }

    /// Apply the `[General]` table of the rule file.
    ///
    /// Recognized keys: `xinput`, `lag`, `quiet`, `timeout_ms`, `cache`.
    /// Unknown keys are logged and ignored.
    pub fn apply_general(&mut self, general: &IndexMap<String, toml::Value>) -> Result<(), SettingsError> {
        for (key, value) in general {
            match key.as_str() {
                "xinput" => self.xinput_path = PathBuf::from(expect_str(key, value)?),
                "lag" => self.set_lag(expect_int(key, value)?)?,
                "quiet" => self.quiet = parse_bool_value(key, value)?,
                "timeout_ms" => {
                    let ms = expect_int(key, value)?;
                    self.call_timeout = match u64::try_from(ms) {
                        Ok(0) => None,
                        Ok(ms) => Some(Duration::from_millis(ms)),
                        Err(_) => {
                            return Err(SettingsError::InvalidValue(format!("timeout_ms = {}", ms)))
                        }
                    };
                }
                "cache" => {
                    if !parse_bool_value(key, value)? {
                        self.cache_dir = None;
                    }
                }
                other => log::warn!("unknown [General] setting {:?} ignored", other),
            }
        }
        Ok(())
    }

    /// Apply `HECATON_XINPUT`, `HECATON_LAG` and `HECATON_CACHE_DIR`
    pub fn apply_env(&mut self) -> Result<(), SettingsError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), SettingsError> {
        if let Some(path) = var("HECATON_XINPUT").filter(|v| !v.is_empty()) {
            self.xinput_path = PathBuf::from(path);
        }
        if let Some(lag) = var("HECATON_LAG") {
            let lag = lag
                .trim()
                .parse::<i64>()
                .map_err(|_| SettingsError::InvalidValue(format!("HECATON_LAG={}", lag)))?;
            self.set_lag(lag)?;
        }
        if let Some(dir) = var("HECATON_CACHE_DIR").filter(|v| !v.is_empty()) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Set the lag window (1..=60 minutes)
    pub fn set_lag(&mut self, minutes: i64) -> Result<(), SettingsError> {
        match u32::try_from(minutes) {
            Ok(minutes @ 1..=60) => {
                self.lag_minutes = minutes;
                Ok(())
            }
            _ => Err(SettingsError::InvalidValue(format!(
                "lag must be between 1 and 60 minutes, got {}",
                minutes
            ))),
        }
    }

    /// Lock file serializing concurrent invocations
    pub fn lock_path(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(default_cache_dir)
            .join("hecaton.lock")
    }
}

/// `$XDG_RUNTIME_DIR/hecaton`, or a per-user directory under the temp dir
pub fn default_cache_dir() -> PathBuf {
    match dirs::runtime_dir() {
        Some(dir) => dir.join("hecaton"),
        // SAFETY: getuid has no preconditions and cannot fail
        None => std::env::temp_dir().join(format!("hecaton-{}", unsafe { libc::getuid() })),
    }
}

fn expect_str<'a>(key: &str, value: &'a toml::Value) -> Result<&'a str, SettingsError> {
    value
        .as_str()
        .ok_or_else(|| SettingsError::InvalidValue(format!("{} must be a string, got {}", key, value)))
}

fn expect_int(key: &str, value: &toml::Value) -> Result<i64, SettingsError> {
    match value {
        toml::Value::Integer(i) => Ok(*i),
        toml::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| SettingsError::InvalidValue(format!("{} must be an integer, got {:?}", key, s))),
        other => Err(SettingsError::InvalidValue(format!(
            "{} must be an integer, got {}",
            key, other
        ))),
    }
}

/// Parse a TOML value as a boolean
fn parse_bool_value(key: &str, value: &toml::Value) -> Result<bool, SettingsError> {
    match value {
        toml::Value::Boolean(b) => Ok(*b),
        toml::Value::Integer(1) => Ok(true),
        toml::Value::Integer(0) => Ok(false),
        toml::Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(SettingsError::InvalidValue(format!(
                "Cannot convert {} = '{}' to boolean",
                key, s
            ))),
        },
        _ => Err(SettingsError::InvalidValue(format!(
            "Cannot convert {} = {} to boolean",
            key, value
        ))),
    }
}
