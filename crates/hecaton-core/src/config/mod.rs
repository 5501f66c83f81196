// Hecaton Config
// Rule file loading and validation

pub mod rules;

pub use rules::{RuleSet, RuleViolation, CONFIG_FILE, CORE, DISABLED, GENERAL, RESERVED_GROUPS};

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),
}
