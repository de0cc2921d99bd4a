//! Registry data model
//!
//! Wire names follow the registry's column naming (`i_id`, `c_device`,
//! `n_device_name`, ...). Records loaded from the backend are never mutated
//! by the engine; operator edits live in [`crate::MappingDecision`]s.

use std::fmt;
use std::str::FromStr;

use common::serde_helpers::{
    bool_true, deserialize_bool_flexible, deserialize_optional_string, deserialize_string_lenient,
};
use errors::SyncError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

// ============================================================================
// Direction
// ============================================================================

/// Passage direction a device is installed for
///
/// Encoded on the wire as `0` (none), `1` (in), `2` (out).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    #[default]
    None,
    In,
    Out,
}

impl Direction {
    pub fn code(self) -> u8 {
        match self {
            Direction::None => 0,
            Direction::In => 1,
            Direction::Out => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Direction::None),
            1 => Some(Direction::In),
            2 => Some(Direction::Out),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::None => "NONE",
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("none") || t == "0" {
            Ok(Direction::None)
        } else if t.eq_ignore_ascii_case("in") || t == "1" {
            Ok(Direction::In)
        } else if t.eq_ignore_ascii_case("out") || t == "2" {
            Ok(Direction::Out)
        } else {
            Err(SyncError::Validation(format!(
                "Invalid direction '{}', expected NONE, IN or OUT",
                s
            )))
        }
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum CodeOrName {
            Code(u64),
            Name(String),
        }

        match Option::<CodeOrName>::deserialize(deserializer)? {
            None => Ok(Direction::None),
            Some(CodeOrName::Code(code)) => u8::try_from(code)
                .ok()
                .and_then(Direction::from_code)
                .ok_or_else(|| D::Error::custom(format!("Invalid direction code {}", code))),
            Some(CodeOrName::Name(name)) => name.parse().map_err(D::Error::custom),
        }
    }
}

// ============================================================================
// Incoming hardware scan
// ============================================================================

/// One hardware component reported by a scanned terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingSubItem {
    #[serde(rename = "sub_item_type", default, deserialize_with = "deserialize_string_lenient")]
    pub item_type: String,
    #[serde(rename = "sub_model_code", default, deserialize_with = "deserialize_string_lenient")]
    pub model_code: String,
    #[serde(rename = "sub_model_name", default, deserialize_with = "deserialize_string_lenient")]
    pub model_name: String,
    #[serde(
        rename = "sub_serial_number",
        default,
        deserialize_with = "deserialize_string_lenient"
    )]
    pub serial_number: String,
    #[serde(
        rename = "sub_item_serial_code",
        default,
        deserialize_with = "deserialize_string_lenient"
    )]
    pub item_serial_code: String,
}

/// Parse the JSON-encoded sub-item list of an incoming record
///
/// Malformed input yields an empty list; the failure is logged, not raised.
pub fn parse_sub_items(raw: &str) -> Vec<IncomingSubItem> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<IncomingSubItem>>(raw) {
        Ok(items) => items,
        Err(e) => {
            warn!("{}", SyncError::parse("incoming item list", e));
            Vec::new()
        },
    }
}

fn deserialize_sub_items<'de, D>(deserializer: D) -> Result<Vec<IncomingSubItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(raw)) => parse_sub_items(&raw),
        Some(value @ Value::Array(_)) => {
            serde_json::from_value(value).unwrap_or_else(|e: serde_json::Error| {
                warn!("{}", SyncError::parse("incoming item list", e));
                Vec::new()
            })
        },
        Some(other) => {
            warn!(
                "{}",
                SyncError::parse("incoming item list", format!("unexpected value {}", other))
            );
            Vec::new()
        },
    };
    Ok(items)
}

/// Hardware-reported scan of a physical terminal awaiting reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingRecord {
    /// Sync correlation id
    #[serde(rename = "i_id", deserialize_with = "deserialize_string_lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_string_lenient")]
    pub item_serial_code: String,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub model_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_lenient")]
    pub model_name: String,
    #[serde(default, deserialize_with = "deserialize_string_lenient")]
    pub station_code: String,
    #[serde(default, deserialize_with = "deserialize_string_lenient")]
    pub station_name: String,
    #[serde(
        rename = "c_project",
        alias = "client_name",
        default,
        deserialize_with = "deserialize_optional_string"
    )]
    pub project: Option<String>,
    #[serde(rename = "c_signature", default, deserialize_with = "deserialize_optional_string")]
    pub signature: Option<String>,
    #[serde(rename = "item", default, deserialize_with = "deserialize_sub_items")]
    pub items: Vec<IncomingSubItem>,
}

// ============================================================================
// Registry entities
// ============================================================================

/// Catalog entry describing a known class of device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDefinition {
    #[serde(rename = "c_device", deserialize_with = "deserialize_string_lenient")]
    pub device_code: String,
    #[serde(rename = "c_device_type", default, deserialize_with = "deserialize_string_lenient")]
    pub device_type_code: String,
    #[serde(rename = "n_device_type", default, deserialize_with = "deserialize_string_lenient")]
    pub device_type_name: String,
    #[serde(rename = "c_project", default, deserialize_with = "deserialize_optional_string")]
    pub project: Option<String>,
    #[serde(
        rename = "c_sequence",
        alias = "sequence_number",
        default,
        deserialize_with = "deserialize_string_lenient"
    )]
    pub sequence_number: String,
}

/// Device already registered on a terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingDevice {
    #[serde(rename = "i_id", deserialize_with = "deserialize_string_lenient")]
    pub id: String,
    #[serde(rename = "c_device", default, deserialize_with = "deserialize_string_lenient")]
    pub device_code: String,
    #[serde(
        rename = "c_serial_number",
        default,
        deserialize_with = "deserialize_string_lenient"
    )]
    pub serial_number: String,
    #[serde(rename = "c_device_type", default, deserialize_with = "deserialize_string_lenient")]
    pub device_type_code: String,
    #[serde(rename = "n_device_name", default, deserialize_with = "deserialize_string_lenient")]
    pub device_name: String,
    #[serde(rename = "c_direction", default)]
    pub direction: Direction,
    #[serde(rename = "c_project", default, deserialize_with = "deserialize_optional_string")]
    pub project: Option<String>,
    #[serde(rename = "c_terminal_sn", default, deserialize_with = "deserialize_optional_string")]
    pub terminal_serial: Option<String>,
    #[serde(
        rename = "b_active",
        default = "bool_true",
        deserialize_with = "deserialize_bool_flexible"
    )]
    pub active: bool,
    #[serde(rename = "c_sub_item_type", default, deserialize_with = "deserialize_optional_string")]
    pub sub_item_type: Option<String>,
    #[serde(rename = "c_sub_item_code", default, deserialize_with = "deserialize_optional_string")]
    pub sub_item_code: Option<String>,
    #[serde(
        rename = "c_sub_item_serial_code",
        default,
        deserialize_with = "deserialize_optional_string"
    )]
    pub sub_item_serial_code: Option<String>,
}

/// Registry terminal an incoming record is reconciled into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetTerminal {
    #[serde(rename = "i_id", deserialize_with = "deserialize_string_lenient")]
    pub id: String,
    #[serde(rename = "c_terminal_sn", default, deserialize_with = "deserialize_optional_string")]
    pub terminal_serial: Option<String>,
    #[serde(rename = "c_terminal_type", default, deserialize_with = "deserialize_string_lenient")]
    pub terminal_type: String,
    #[serde(rename = "c_project", default, deserialize_with = "deserialize_optional_string")]
    pub project: Option<String>,
    #[serde(rename = "c_station", default, deserialize_with = "deserialize_optional_string")]
    pub station: Option<String>,
    #[serde(rename = "n_terminal_name", default, deserialize_with = "deserialize_string_lenient")]
    pub terminal_name: String,
    #[serde(rename = "t_m_device", default)]
    pub devices: Vec<ExistingDevice>,
}

impl TargetTerminal {
    pub fn device(&self, id: &str) -> Option<&ExistingDevice> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Selection label, e.g. `GATE 01 (072-1293)` or `GATE 02 (No SN)`
    pub fn label(&self) -> String {
        match &self.terminal_serial {
            Some(sn) => format!("{} ({})", self.terminal_name, sn),
            None => format!("{} (No SN)", self.terminal_name),
        }
    }
}

/// Detail endpoint payload: the incoming record plus the terminal the
/// backend resolved for its serial, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncDetail {
    #[serde(default)]
    pub terminal: Option<TargetTerminal>,
    #[serde(rename = "syncTerminal", alias = "sync_terminal")]
    pub sync_terminal: IncomingRecord,
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direction_wire_codes() {
        assert_eq!(serde_json::to_value(Direction::Out).unwrap(), json!(2));
        let d: Direction = serde_json::from_value(json!(1)).unwrap();
        assert_eq!(d, Direction::In);
        let d: Direction = serde_json::from_value(json!("out")).unwrap();
        assert_eq!(d, Direction::Out);
        let d: Direction = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(d, Direction::None);
        assert!(serde_json::from_value::<Direction>(json!(7)).is_err());
    }

    #[test]
    fn test_item_list_as_encoded_string() {
        let record: IncomingRecord = serde_json::from_value(json!({
            "i_id": "a646fb58",
            "item_serial_code": "072-1293",
            "model_name": "Magnetic-Gate MPP 122",
            "station_code": "JUA",
            "station_name": "JUANDA",
            "item": "[{\"sub_item_type\":\"MODULE READER\",\"sub_model_code\":\"0120201\",\"sub_model_name\":\"DE-AFCMI Reader 6 SAM\",\"sub_serial_number\":\"1071137441\"}]",
            "c_signature": null
        }))
        .unwrap();

        assert_eq!(record.items.len(), 1);
        assert_eq!(record.items[0].item_type, "MODULE READER");
        assert_eq!(record.items[0].serial_number, "1071137441");
        assert_eq!(record.items[0].item_serial_code, "");
        assert_eq!(record.signature, None);
    }

    #[test]
    fn test_malformed_item_list_is_empty() {
        let record: IncomingRecord = serde_json::from_value(json!({
            "i_id": "s1",
            "item": "[{\"sub_item_type\": "
        }))
        .unwrap();
        assert!(record.items.is_empty());

        let record: IncomingRecord =
            serde_json::from_value(json!({ "i_id": "s1", "item": 42 })).unwrap();
        assert!(record.items.is_empty());
    }

    #[test]
    fn test_item_list_inline_array() {
        let record: IncomingRecord = serde_json::from_value(json!({
            "i_id": "s1",
            "item": [{ "sub_item_type": "DISPLAY", "sub_serial_number": 12345 }]
        }))
        .unwrap();
        assert_eq!(record.items[0].serial_number, "12345");
    }

    #[test]
    fn test_terminal_label_and_lookup() {
        let terminal: TargetTerminal = serde_json::from_value(json!({
            "i_id": "t1",
            "c_terminal_sn": null,
            "c_terminal_type": "G10",
            "n_terminal_name": "GATE 02",
            "t_m_device": [{
                "i_id": "d1",
                "c_device": "reader_prepaid",
                "c_serial_number": "1071137441",
                "c_device_type": "RP",
                "n_device_name": "READER PREPAID JUA 01",
                "c_direction": 1
            }]
        }))
        .unwrap();

        assert_eq!(terminal.label(), "GATE 02 (No SN)");
        let device = terminal.device("d1").unwrap();
        assert_eq!(device.direction, Direction::In);
        assert!(device.active);
        assert!(terminal.device("d2").is_none());
    }

    #[test]
    fn test_detail_accepts_both_record_keys() {
        let detail: SyncDetail = serde_json::from_value(json!({
            "terminal": null,
            "sync_terminal": { "i_id": "s1" }
        }))
        .unwrap();
        assert!(detail.terminal.is_none());
        assert_eq!(detail.sync_terminal.id, "s1");
    }
}
