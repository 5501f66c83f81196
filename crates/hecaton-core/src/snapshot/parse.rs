// Hecaton Snapshot - xinput output parsing
// Line grammars for `xinput list` and `xinput list-props`

use std::sync::OnceLock;

use regex::Regex;

use crate::device::{Device, Kind, Properties, PropertyValue, Role, DEVICE_NODE, DEVICE_NODE_CODE, PRODUCT_ID, PRODUCT_ID_CODE};

/// Codes always reported as floating point values
const FLOAT_CODES: &[u32] = &[289, 290];

/// Codes the server reports as lists, even when they hold a single item
const LIST_CODES: &[u32] = &[268, 269, 270, 271, 291, 292];

/// Token xinput prints for a list property without items
const NO_ITEMS: &str = "<no items>";

fn device_line() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        // Tree-drawing characters come first, the name starts at the first
        // word boundary.
        Regex::new(
            r"^.*?\b(.*?)\s+id=(\d+)\s+\[(master|slave)\s+(keyboard|pointer)\s+\((\d+)\)\]",
        )
        .expect("device line regex")
    })
}

fn props_header() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| Regex::new(r"^Device '(.*)':\s*$").expect("props header regex"))
}

fn props_line() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r"^\s+(.+?)\s+\((\d+)\):\s*(.*?)\s*$").expect("props line regex")
    })
}

/// Parse one line of `xinput list`, if it describes a master or attached slave
pub fn parse_device_line(line: &str) -> Option<Device> {
    let caps = device_line().captures(line)?;
    let id = caps[2].parse().ok()?;
    let role: Role = caps[3].parse().ok()?;
    let kind: Kind = caps[4].parse().ok()?;
    let pair = caps[5].parse().ok()?;
    Some(Device::new(id, caps[1].trim(), role, kind, pair))
}

/// Parse the whole `xinput list` output.
///
/// Lines outside the grammar (headers, floating slaves) are skipped.
pub fn parse_device_list(text: &str) -> Vec<Device> {
    text.lines().filter_map(parse_device_line).collect()
}

/// Parse `xinput list-props` output into per-device blocks, in output order.
///
/// Each block carries the label from its `Device '<label>':` header.
pub fn parse_properties(text: &str) -> Vec<(String, Properties)> {
    let mut blocks: Vec<(String, Properties)> = Vec::new();

    for line in text.lines() {
        if let Some(caps) = props_header().captures(line) {
            blocks.push((caps[1].to_string(), Properties::new()));
            continue;
        }
        let Some(caps) = props_line().captures(line) else {
            continue;
        };
        let Some((_, properties)) = blocks.last_mut() else {
            log::trace!("property line before any device header: {:?}", line);
            continue;
        };
        let label = caps[1].to_string();
        let code: u32 = match caps[2].parse() {
            Ok(code) => code,
            Err(_) => continue,
        };
        let value = parse_value(&label, code, &caps[3]);
        properties.insert(label, Some(code), value);
    }

    blocks
}

/// Type a raw property value by its code and label
pub fn parse_value(label: &str, code: u32, raw: &str) -> PropertyValue {
    let raw = raw.trim();

    if code == PRODUCT_ID_CODE || label == PRODUCT_ID {
        if let Some(id) = hardware_id(raw) {
            return PropertyValue::HardwareId(id);
        }
    }
    if code == DEVICE_NODE_CODE || label == DEVICE_NODE {
        return PropertyValue::String(unquote(raw).to_string());
    }
    if raw == NO_ITEMS {
        return PropertyValue::List(Vec::new());
    }
    if FLOAT_CODES.contains(&code) || label.contains("Matrix") {
        return typed(raw, parse_float);
    }
    if LIST_CODES.contains(&code) {
        return PropertyValue::List(split(raw).map(parse_generic).collect());
    }
    if label.contains("Enabled") {
        return typed(raw, parse_bool);
    }
    typed(raw, |item| item.parse().ok().map(PropertyValue::Int))
}

/// Render `1133, 49298` as `046d:c092`
fn hardware_id(raw: &str) -> Option<String> {
    let parts = split(raw)
        .map(|item| item.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(
        parts
            .iter()
            .map(|part| format!("{:04x}", part))
            .collect::<Vec<_>>()
            .join(":"),
    )
}

fn split(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Scalar for single values, list for comma-separated ones.
/// Items the preferred parser rejects fall back to generic typing.
fn typed(raw: &str, parse: impl Fn(&str) -> Option<PropertyValue>) -> PropertyValue {
    let item = |item: &str| parse(item).unwrap_or_else(|| parse_generic(item));
    if raw.contains(',') {
        PropertyValue::List(split(raw).map(item).collect())
    } else {
        item(raw)
    }
}

fn parse_float(item: &str) -> Option<PropertyValue> {
    item.parse().ok().map(PropertyValue::Float)
}

fn parse_bool(item: &str) -> Option<PropertyValue> {
    match item {
        "1" => Some(PropertyValue::Bool(true)),
        "0" => Some(PropertyValue::Bool(false)),
        _ => None,
    }
}

fn parse_generic(item: &str) -> PropertyValue {
    if let Ok(int) = item.parse() {
        return PropertyValue::Int(int);
    }
    if let Ok(float) = item.parse() {
        return PropertyValue::Float(float);
    }
    PropertyValue::String(unquote(item).to_string())
}

fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
⎡ Virtual core pointer                    \tid=2\t[master pointer  (3)]
⎜   ↳ Virtual core XTEST pointer              \tid=4\t[slave  pointer  (2)]
⎜   ↳ Logitech USB Receiver                   \tid=11\t[slave  pointer  (2)]
⎣ Virtual core keyboard                   \tid=3\t[master keyboard (2)]
    ↳ Virtual core XTEST keyboard             \tid=5\t[slave  keyboard (3)]
    ↳ Power Button                            \tid=6\t[slave  keyboard (3)]
∼ Floating Tablet                             \tid=14\t[floating slave]
";

    #[test]
    fn test_parse_device_list_skips_non_matching_lines() {
        let devices = parse_device_list(LISTING);
        assert_eq!(devices.len(), 6);
        assert!(devices.iter().all(|d| d.id != 14));
    }

    #[test]
    fn test_parse_device_line_fields() {
        let devices = parse_device_list(LISTING);
        let vcp = &devices[0];
        assert_eq!(vcp.name, "Virtual core pointer");
        assert_eq!((vcp.id, vcp.role, vcp.kind, vcp.pair), (2, Role::Master, Kind::Pointer, 3));

        let receiver = devices.iter().find(|d| d.id == 11).unwrap();
        assert_eq!(receiver.name, "Logitech USB Receiver");
        assert_eq!(receiver.role, Role::Slave);
        assert_eq!(receiver.pair, 2);
    }

    #[test]
    fn test_parse_device_list_ignores_banner() {
        assert!(parse_device_list("xinput version 1.6.3\nXI version on server: 2.3\n").is_empty());
    }

    #[test]
    fn test_parse_properties_blocks_in_order() {
        let text = "\
Device 'Virtual core XTEST pointer':
\tDevice Enabled (169):\t1
\tCoordinate Transformation Matrix (171):\t1.000000, 0.000000, 0.000000, 0.000000, 1.000000, 0.000000, 0.000000, 0.000000, 1.000000
Device 'Logitech USB Receiver':
\tDevice Enabled (169):\t0
\tDevice Node (266):\t\"/dev/input/event7\"
\tDevice Product ID (267):\t1133, 50475
\tlibinput Accel Speed (289):\t0.250000
\tlibinput Scroll Methods Available (268):\t0, 0, 1
";
        let blocks = parse_properties(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].0, "Virtual core XTEST pointer");

        let first = &blocks[0].1;
        assert_eq!(first.get("Device Enabled"), Some(&PropertyValue::Bool(true)));
        match first.get_code(171) {
            Some(PropertyValue::List(items)) => {
                assert_eq!(items.len(), 9);
                assert_eq!(items[0], PropertyValue::Float(1.0));
            }
            other => panic!("expected matrix list, got {:?}", other),
        }

        let second = &blocks[1].1;
        assert_eq!(second.get_code(169), Some(&PropertyValue::Bool(false)));
        assert_eq!(second.get(DEVICE_NODE), Some(&PropertyValue::String("/dev/input/event7".into())));
        assert_eq!(second.get_code(267), Some(&PropertyValue::HardwareId("046d:c52b".into())));
        assert_eq!(second.get_code(289), Some(&PropertyValue::Float(0.25)));
        assert_eq!(
            second.get_code(268),
            Some(&PropertyValue::List(vec![
                PropertyValue::Int(0),
                PropertyValue::Int(0),
                PropertyValue::Int(1)
            ]))
        );
    }

    #[test]
    fn test_parse_value_no_items_is_empty_list() {
        assert_eq!(parse_value("libinput Click Methods Available", 270, "<no items>"), PropertyValue::List(vec![]));
        assert_eq!(parse_value("Some Property", 400, "<no items>"), PropertyValue::List(vec![]));
    }

    #[test]
    fn test_parse_value_single_list_code_item_is_list() {
        assert_eq!(parse_value("Whatever", 291, "3"), PropertyValue::List(vec![PropertyValue::Int(3)]));
    }

    #[test]
    fn test_parse_value_integer_fallbacks() {
        assert_eq!(parse_value("Device Accel Profile", 300, "0"), PropertyValue::Int(0));
        assert_eq!(parse_value("Device Accel Velocity Scaling", 301, "10.000000"), PropertyValue::Float(10.0));
        assert_eq!(parse_value("Device Accel Name", 302, "\"flat\""), PropertyValue::String("flat".into()));
    }

    #[test]
    fn test_product_id_recognized_by_label_with_other_code() {
        assert_eq!(
            parse_value(PRODUCT_ID, 281, "1452, 834"),
            PropertyValue::HardwareId("05ac:0342".into())
        );
    }

    #[test]
    fn test_property_line_before_header_is_dropped() {
        let blocks = parse_properties("\tDevice Enabled (169):\t1\n");
        assert!(blocks.is_empty());
    }
}
