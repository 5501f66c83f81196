// Hecaton Integration Tests
//
// These tests verify the configuration pipeline:
// rule file -> RuleSet -> Settings / RoutingPolicy -> routing decisions
//
// Run with: cargo test --test integration_test

use std::fs;
use std::time::Duration;

use chrono::NaiveTime;
use hecaton_core::device::{DEVICE_NODE_CODE, PRODUCT_ID_CODE};
use hecaton_core::{Device, Kind, PropertyValue, Role, RoutingPolicy, RuleSet, RuleViolation, Settings};

const RULES: &str = r#"
[General]
lag = 5
timeout_ms = 2500
cache = false

[Core]
"AT Translated Set 2 keyboard" = true
"SynPS/2 Synaptics TouchPad" = true

[Laptop]
"046d:c52b" = true
"/dev/input/event1?" = true

[Desk]
"*Kinesis*" = true
"*/usb1/1-2/*" = true

[Disabled]
"Power Button" = true
"#;

fn slave(id: u32, name: &str, kind: Kind) -> Device {
    Device::new(id, name, Role::Slave, kind, 2)
}

fn load(content: &str) -> RuleSet {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hecaton.toml");
    fs::write(&path, content).unwrap();
    RuleSet::from_toml_path(&path).unwrap()
}

#[test]
fn test_rule_file_loads_and_validates() {
    let rules = load(RULES);

    assert!(rules.validate().is_ok());
    let groups: Vec<&str> = rules.routing_groups().map(|(group, _)| group).collect();
    assert_eq!(groups, vec!["Laptop", "Desk"]);
    assert_eq!(rules.patterns("Desk").unwrap(), vec!["*Kinesis*", "*/usb1/1-2/*"]);
}

#[test]
fn test_general_table_feeds_settings() {
    let rules = load(RULES);
    let mut settings = Settings::new();
    settings.apply_general(rules.general().unwrap()).unwrap();

    assert_eq!(settings.lag_minutes, 5);
    assert_eq!(settings.call_timeout, Some(Duration::from_millis(2500)));
    assert!(settings.cache_dir.is_none());
}

#[test]
fn test_every_violation_is_reported() {
    let rules = load(
        r#"
[Laptop]
"Logitech*" = true

[Desk]
"Logitech*" = true
"#,
    );

    let violations = rules.validate().unwrap_err();
    assert_eq!(violations.len(), 2);
    assert_eq!(violations[0], RuleViolation::MissingCore);
    assert_eq!(
        violations[1].to_string(),
        "Device \"Logitech*\" first declared in section [Laptop] reused in section [Desk]"
    );
}

#[test]
fn test_unreadable_rule_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(RuleSet::from_toml_path(dir.path().join("missing.toml")).is_err());

    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "[Core\n").unwrap();
    assert!(RuleSet::from_toml_path(&broken).is_err());
}

#[test]
fn test_routing_by_each_identifier() {
    let policy = RoutingPolicy::rules(&load(RULES));

    let by_hardware_id = slave(10, "USB Receiver", Kind::Pointer).with_property(
        "Device Product ID",
        Some(PRODUCT_ID_CODE),
        PropertyValue::HardwareId("046d:c52b".into()),
    );
    let by_node = slave(11, "Wacom Pen", Kind::Pointer).with_property(
        "Device Node",
        Some(DEVICE_NODE_CODE),
        PropertyValue::String("/dev/input/event12".into()),
    );
    let by_name = slave(12, "Kinesis Advantage2 Keyboard", Kind::Keyboard);
    let by_path = slave(13, "Trackball", Kind::Pointer)
        .with_system_path("/sys/devices/pci0000:00/usb1/1-2/1-2:1.0/0003:1234:5678.0001");

    assert_eq!(policy.route(&by_hardware_id).as_deref(), Some("Laptop"));
    assert_eq!(policy.route(&by_node).as_deref(), Some("Laptop"));
    assert_eq!(policy.route(&by_name).as_deref(), Some("Desk"));
    assert_eq!(policy.route(&by_path).as_deref(), Some("Desk"));
}

#[test]
fn test_reserved_groups_never_route() {
    let policy = RoutingPolicy::rules(&load(RULES));

    let builtin = slave(14, "AT Translated Set 2 keyboard", Kind::Keyboard);
    let button = slave(15, "Power Button", Kind::Keyboard);

    assert_eq!(policy.route(&builtin), None);
    assert_eq!(policy.route(&button), None);
    assert!(policy.is_disabled(&button));
    assert!(!policy.is_disabled(&builtin));
}

#[test]
fn test_time_bucket_policy_ignores_devices() {
    let policy = RoutingPolicy::time_bucket(5);
    let at = NaiveTime::from_hms_opt(9, 7, 30).unwrap();

    let mouse = slave(20, "Mouse", Kind::Pointer);
    let keyboard = slave(21, "Keyboard", Kind::Keyboard);

    assert_eq!(policy.route_at(&mouse, at).as_deref(), Some("Hecaton Master 0905"));
    assert_eq!(policy.route_at(&keyboard, at), policy.route_at(&mouse, at));
    assert!(!policy.is_disabled(&mouse));
}
