// Hecaton Device Model
// XInput devices and their typed property sets

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

/// Label of the property holding the evdev node (e.g. "/dev/input/event5")
pub const DEVICE_NODE: &str = "Device Node";
/// Property code the server uses for `Device Node`
pub const DEVICE_NODE_CODE: u32 = 266;
/// Label of the property holding the USB vendor/product pair
pub const PRODUCT_ID: &str = "Device Product ID";
/// Property code the server uses for `Device Product ID`
pub const PRODUCT_ID_CODE: u32 = 267;

/// Marker contained in the names of the server's built-in test devices.
///
/// Every master pair gets one XTEST pointer and one XTEST keyboard attached
/// automatically; they never count as real usage.
pub const TEST_DEVICE_MARKER: &str = "XTEST";

/// Device role in the XI2 hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Slave,
}

/// Device kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Pointer,
    Keyboard,
}

/// A typed property value as reported by `xinput list-props`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Bool(bool),
    Float(f64),
    /// Ordered list of primitive values
    List(Vec<PropertyValue>),
    /// Normalized `vvvv:pppp` hardware id
    HardwareId(String),
}

impl PropertyValue {
    /// Textual view used for pattern matching.
    ///
    /// Only string-like values have one; numbers and lists are never
    /// matched against patterns.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) | PropertyValue::HardwareId(s) => Some(s),
            _ => None,
        }
    }
}

/// Property set of one device.
///
/// Values are stored under their canonical label. The numeric codes the
/// server prints next to each label are kept in an alias table so lookups
/// by code resolve to the same value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    values: IndexMap<String, PropertyValue>,
    aliases: BTreeMap<u32, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value under `label`, registering `code` as its alias
    pub fn insert(&mut self, label: impl Into<String>, code: Option<u32>, value: PropertyValue) {
        let label = label.into();
        if let Some(code) = code {
            self.aliases.insert(code, label.clone());
        }
        self.values.insert(label, value);
    }

    /// Look up a value by its label
    pub fn get(&self, label: &str) -> Option<&PropertyValue> {
        self.values.get(label)
    }

    /// Look up a value by its numeric code
    pub fn get_code(&self, code: u32) -> Option<&PropertyValue> {
        self.aliases.get(&code).and_then(|label| self.values.get(label))
    }

    /// Look up by label first, then by code
    pub fn lookup(&self, label: &str, code: u32) -> Option<&PropertyValue> {
        self.get(label).or_else(|| self.get_code(code))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One XInput device (master or slave)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Server-assigned id, only meaningful within one snapshot
    pub id: u32,
    pub name: String,
    pub role: Role,
    pub kind: Kind,
    /// For masters: the sibling master of the other kind.
    /// For slaves: the master they are attached to.
    pub pair: u32,
    #[serde(default)]
    pub properties: Properties,
    /// Physical location resolved through sysfs, if the device has a node
    #[serde(default)]
    pub system_path: Option<PathBuf>,
}

impl Device {
    pub fn new(id: u32, name: impl Into<String>, role: Role, kind: Kind, pair: u32) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            kind,
            pair,
            properties: Properties::new(),
            system_path: None,
        }
    }

    pub fn with_property(mut self, label: &str, code: Option<u32>, value: PropertyValue) -> Self {
        self.properties.insert(label, code, value);
        self
    }

    pub fn with_system_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_path = Some(path.into());
        self
    }

    pub fn is_master(&self) -> bool {
        self.role == Role::Master
    }

    /// Whether this is one of the server's always-present XTEST devices
    pub fn is_test_device(&self) -> bool {
        self.name.contains(TEST_DEVICE_MARKER)
    }

    /// Evdev node path, e.g. "/dev/input/event5"
    pub fn device_node(&self) -> Option<&str> {
        self.properties
            .lookup(DEVICE_NODE, DEVICE_NODE_CODE)
            .and_then(PropertyValue::as_text)
    }

    /// Normalized hardware id, e.g. "046d:c52b"
    pub fn hardware_id(&self) -> Option<&str> {
        self.properties
            .lookup(PRODUCT_ID, PRODUCT_ID_CODE)
            .and_then(PropertyValue::as_text)
    }
}

/// Name the server gives to a master created as `group`
pub fn master_name(group: &str, kind: Kind) -> String {
    format!("{} {}", group, kind)
}
