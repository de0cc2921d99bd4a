//! Mapping decisions
//!
//! A decision resolves an incoming sub-item or an existing device to a
//! concrete device record. Decisions are built from catalog definitions
//! (auto-match or operator pick) or from a device already on the target
//! terminal, and never alias the source records.

use serde::{Deserialize, Serialize};

use crate::types::{DeviceDefinition, Direction, ExistingDevice, IncomingSubItem};

/// Resolved device record for one mapping key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDecision {
    pub device_code: String,
    pub device_type_code: String,
    /// Human-readable device name (generated or taken from the registry)
    pub device_name: String,
    pub serial_number: String,
    pub direction: Direction,
    /// Registry id of the existing device this decision takes over, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_item_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_item_serial_code: Option<String>,
}

/// Device name convention: `{type name} {station} {sequence}`
///
/// Empty parts are skipped so a missing station does not leave a double space.
pub fn generated_device_name(type_name: &str, station_code: &str, sequence: &str) -> String {
    [type_name, station_code, sequence]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl MappingDecision {
    /// Map an incoming sub-item onto a catalog definition
    pub fn from_definition(
        definition: &DeviceDefinition,
        item: &IncomingSubItem,
        station_code: &str,
    ) -> Self {
        Self {
            device_code: definition.device_code.clone(),
            device_type_code: definition.device_type_code.clone(),
            device_name: generated_device_name(
                &definition.device_type_name,
                station_code,
                &definition.sequence_number,
            ),
            serial_number: item.serial_number.clone(),
            direction: Direction::None,
            source_device_id: None,
            project: definition.project.clone(),
            sub_item_type: non_empty(&item.item_type),
            sub_item_code: non_empty(&item.model_code),
            sub_item_serial_code: non_empty(&item.item_serial_code),
        }
    }

    /// Map an incoming sub-item onto a device already on the terminal
    ///
    /// The registry identity (code, type, name, direction) comes from the
    /// device; the serial number comes from the scanned hardware.
    pub fn from_existing_for_item(device: &ExistingDevice, item: &IncomingSubItem) -> Self {
        Self {
            device_code: device.device_code.clone(),
            device_type_code: device.device_type_code.clone(),
            device_name: device.device_name.clone(),
            serial_number: item.serial_number.clone(),
            direction: device.direction,
            source_device_id: Some(device.id.clone()),
            project: device.project.clone(),
            sub_item_type: non_empty(&item.item_type),
            sub_item_code: non_empty(&item.model_code),
            sub_item_serial_code: non_empty(&item.item_serial_code),
        }
    }

    /// Decision that keeps an existing device as registered
    pub fn from_existing(device: &ExistingDevice) -> Self {
        Self {
            device_code: device.device_code.clone(),
            device_type_code: device.device_type_code.clone(),
            device_name: device.device_name.clone(),
            serial_number: device.serial_number.clone(),
            direction: device.direction,
            source_device_id: Some(device.id.clone()),
            project: device.project.clone(),
            sub_item_type: device.sub_item_type.clone(),
            sub_item_code: device.sub_item_code.clone(),
            sub_item_serial_code: device.sub_item_serial_code.clone(),
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    /// Whether this decision designates `device` (by takeover or by code + serial)
    pub fn refers_to(&self, device: &ExistingDevice) -> bool {
        self.source_device_id.as_deref() == Some(device.id.as_str())
            || (self.device_code == device.device_code
                && self.serial_number == device.serial_number)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn reader_definition() -> DeviceDefinition {
        DeviceDefinition {
            device_code: "reader_prepaid".into(),
            device_type_code: "RP".into(),
            device_type_name: "READER PREPAID".into(),
            project: Some("KCI".into()),
            sequence_number: "01".into(),
        }
    }

    fn reader_item() -> IncomingSubItem {
        IncomingSubItem {
            item_type: "MODULE READER".into(),
            model_code: "0120201".into(),
            model_name: "DE-AFCMI Reader 6 SAM".into(),
            serial_number: "1071137441".into(),
            item_serial_code: String::new(),
        }
    }

    #[test]
    fn test_generated_name() {
        assert_eq!(
            generated_device_name("READER PREPAID", "JUA", "01"),
            "READER PREPAID JUA 01"
        );
        assert_eq!(generated_device_name("DISPLAY", "", "02"), "DISPLAY 02");
    }

    #[test]
    fn test_from_definition_carries_scan_metadata() {
        let decision = MappingDecision::from_definition(&reader_definition(), &reader_item(), "JUA");
        assert_eq!(decision.device_code, "reader_prepaid");
        assert_eq!(decision.device_name, "READER PREPAID JUA 01");
        assert_eq!(decision.serial_number, "1071137441");
        assert_eq!(decision.direction, Direction::None);
        assert_eq!(decision.sub_item_type.as_deref(), Some("MODULE READER"));
        assert_eq!(decision.sub_item_code.as_deref(), Some("0120201"));
        assert_eq!(decision.sub_item_serial_code, None);
        assert_eq!(decision.source_device_id, None);
    }

    #[test]
    fn test_refers_to() {
        let device = ExistingDevice {
            id: "d1".into(),
            device_code: "reader_prepaid".into(),
            serial_number: "1071137441".into(),
            device_type_code: "RP".into(),
            device_name: "READER PREPAID JUA 01".into(),
            direction: Direction::In,
            project: None,
            terminal_serial: None,
            active: true,
            sub_item_type: None,
            sub_item_code: None,
            sub_item_serial_code: None,
        };

        let by_identity = MappingDecision::from_definition(&reader_definition(), &reader_item(), "JUA");
        assert!(by_identity.refers_to(&device));

        let mut replacement = reader_item();
        replacement.serial_number = "9999".into();
        let takeover = MappingDecision::from_existing_for_item(&device, &replacement);
        assert!(takeover.refers_to(&device));
        assert_eq!(takeover.serial_number, "9999");
        assert_eq!(takeover.direction, Direction::In);

        let unrelated = MappingDecision::from_definition(&reader_definition(), &replacement, "JUA");
        assert!(!unrelated.refers_to(&device));
    }
}
