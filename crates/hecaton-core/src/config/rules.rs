// Hecaton Config - rule file
// Ordered group -> pattern tables loaded from TOML

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use super::ConfigError;

/// Group every rule file must declare
pub const CORE: &str = "Core";
/// Group holding settings rather than patterns
pub const GENERAL: &str = "General";
/// Group whose devices are switched off instead of routed
pub const DISABLED: &str = "Disabled";

/// Group names that are never routing targets
pub const RESERVED_GROUPS: &[&str] = &[CORE, GENERAL, DISABLED];

/// File name looked up in the working directory and the config directory
pub const CONFIG_FILE: &str = "hecaton.toml";

type Group = IndexMap<String, toml::Value>;

/// Routing rules: group name -> patterns, both in declaration order.
///
/// ```toml
/// [Core]
/// "AT Translated Set 2 keyboard" = true
///
/// [Laptop]
/// "046d:*" = true
/// "*/usb1/1-2/*" = true
/// ```
///
/// Pattern values are ignored. Quote patterns so dots aren't read as
/// nested keys.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    groups: IndexMap<String, Group>,
}

/// A rule file problem that blocks any action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleViolation {
    MissingCore,
    DuplicatePattern {
        pattern: String,
        first: String,
        reused: String,
    },
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleViolation::MissingCore => write!(f, "{} section missing", CORE),
            RuleViolation::DuplicatePattern {
                pattern,
                first,
                reused,
            } => write!(
                f,
                "Device {:?} first declared in section [{}] reused in section [{}]",
                pattern, first, reused
            ),
        }
    }
}

impl RuleSet {
    /// Parse rules from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))
    }

    /// Load rules from a file
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// First existing rule file among `./hecaton.toml` and
    /// `<config dir>/hecaton.toml`
    pub fn find() -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(CONFIG_FILE));
        }
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join(CONFIG_FILE));
        }
        candidates.into_iter().find(|path| path.exists())
    }

    pub fn is_reserved(group: &str) -> bool {
        RESERVED_GROUPS.contains(&group)
    }

    /// All groups with their patterns, in declaration order
    pub fn groups(&self) -> impl Iterator<Item = (&str, Vec<&str>)> {
        self.groups
            .iter()
            .map(|(name, group)| (name.as_str(), group.keys().map(String::as_str).collect()))
    }

    /// Groups devices can be routed to, in declaration order
    pub fn routing_groups(&self) -> impl Iterator<Item = (&str, Vec<&str>)> {
        self.groups().filter(|(name, _)| !Self::is_reserved(name))
    }

    /// Patterns of one group, if declared
    pub fn patterns(&self, group: &str) -> Option<Vec<&str>> {
        self.groups
            .get(group)
            .map(|group| group.keys().map(String::as_str).collect())
    }

    /// Raw `[General]` table
    pub fn general(&self) -> Option<&IndexMap<String, toml::Value>> {
        self.groups.get(GENERAL)
    }

    pub fn contains(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Check the rules, reporting every violation found
    pub fn validate(&self) -> Result<(), Vec<RuleViolation>> {
        let mut violations = Vec::new();

        if !self.contains(CORE) {
            violations.push(RuleViolation::MissingCore);
        }

        let mut first_use: HashMap<&str, &str> = HashMap::new();
        for (group, patterns) in self.groups() {
            if group == GENERAL {
                continue;
            }
            for pattern in patterns {
                match first_use.get(pattern) {
                    Some(first) if *first != group => {
                        violations.push(RuleViolation::DuplicatePattern {
                            pattern: pattern.to_string(),
                            first: first.to_string(),
                            reused: group.to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        first_use.insert(pattern, group);
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
