//! Auto-matcher
//!
//! Two proposal sources, applied in this order:
//!
//! 1. [`match_registered`]: a sub-item whose serial number equals the serial
//!    of a device already on the target terminal takes that device over.
//! 2. [`auto_match`]: a catalog definition, first-match in catalog order, not
//!    a scored ranking. A definition matches when its device code equals the
//!    sub-item's model code, or its type code equals the sub-item type, or
//!    its type name equals the sub-item type ignoring case.
//!
//! The catalog scan has one extension beyond those three rules. Only when no
//! definition matches exactly, a second pass accepts the first definition
//! whose type name shares a word with the sub-item type
//! (`MODULE READER` / `READER PREPAID`). Scanners report free-form type
//! labels that rarely equal a catalog type name. An exact match anywhere in
//! the catalog always wins over this pass.
//!
//! The output is a proposal. [`crate::ReconciliationState::merge_proposals`]
//! adds it without touching keys that already hold a decision.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::decision::MappingDecision;
use crate::types::{DeviceDefinition, ExistingDevice, IncomingSubItem};

/// Words shorter than this never count as a shared type word
const MIN_TYPE_WORD_LEN: usize = 3;

fn exact_match(definition: &DeviceDefinition, item: &IncomingSubItem) -> bool {
    let item_type = item.item_type.trim();
    (!item.model_code.is_empty() && definition.device_code == item.model_code)
        || (!item_type.is_empty() && definition.device_type_code == item_type)
        || (!item_type.is_empty() && definition.device_type_name.trim().eq_ignore_ascii_case(item_type))
}

fn shares_type_word(definition: &DeviceDefinition, item: &IncomingSubItem) -> bool {
    let type_words: Vec<&str> = item
        .item_type
        .split_whitespace()
        .filter(|w| w.len() >= MIN_TYPE_WORD_LEN)
        .collect();

    definition
        .device_type_name
        .split_whitespace()
        .filter(|w| w.len() >= MIN_TYPE_WORD_LEN)
        .any(|word| type_words.iter().any(|t| t.eq_ignore_ascii_case(word)))
}

/// Find the catalog definition for one sub-item
pub fn find_definition<'a>(
    item: &IncomingSubItem,
    catalog: &'a [DeviceDefinition],
) -> Option<&'a DeviceDefinition> {
    catalog
        .iter()
        .find(|definition| exact_match(definition, item))
        .or_else(|| {
            catalog
                .iter()
                .find(|definition| shares_type_word(definition, item))
        })
}

/// Propose a takeover for every sub-item whose serial number is already
/// registered on the terminal
///
/// Blank serials never match and each device is taken over at most once,
/// by the first sub-item carrying its serial.
pub fn match_registered(
    items: &[IncomingSubItem],
    devices: &[ExistingDevice],
) -> BTreeMap<usize, MappingDecision> {
    let mut proposals = BTreeMap::new();
    let mut claimed: HashSet<&str> = HashSet::new();

    for (index, item) in items.iter().enumerate() {
        let serial = item.serial_number.trim();
        if serial.is_empty() {
            continue;
        }
        let found = devices
            .iter()
            .find(|d| !claimed.contains(d.id.as_str()) && d.serial_number.trim() == serial);
        if let Some(device) = found {
            debug!("Item {} ({}) takes over device {}", index, serial, device.id);
            claimed.insert(device.id.as_str());
            proposals.insert(index, MappingDecision::from_existing_for_item(device, item));
        }
    }

    proposals
}

/// Propose a decision for every sub-item that has a catalog match
///
/// Keys are sub-item indices; unmatched items are absent.
pub fn auto_match(
    items: &[IncomingSubItem],
    catalog: &[DeviceDefinition],
    station_code: &str,
) -> BTreeMap<usize, MappingDecision> {
    let mut proposals = BTreeMap::new();

    for (index, item) in items.iter().enumerate() {
        match find_definition(item, catalog) {
            Some(definition) => {
                debug!(
                    "Auto-matched item {} ({}) to {}",
                    index, item.item_type, definition.device_code
                );
                proposals.insert(
                    index,
                    MappingDecision::from_definition(definition, item, station_code),
                );
            },
            None => debug!("No catalog match for item {} ({})", index, item.item_type),
        }
    }

    proposals
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn definition(code: &str, type_code: &str, type_name: &str, seq: &str) -> DeviceDefinition {
        DeviceDefinition {
            device_code: code.into(),
            device_type_code: type_code.into(),
            device_type_name: type_name.into(),
            project: None,
            sequence_number: seq.into(),
        }
    }

    fn item(item_type: &str, model_code: &str, serial: &str) -> IncomingSubItem {
        IncomingSubItem {
            item_type: item_type.into(),
            model_code: model_code.into(),
            model_name: String::new(),
            serial_number: serial.into(),
            item_serial_code: String::new(),
        }
    }

    #[test]
    fn test_match_by_model_code() {
        let catalog = vec![
            definition("display", "DSP", "DISPLAY", "01"),
            definition("0720301", "BS", "BARCODE", "01"),
        ];
        let found = find_definition(&item("SCANNER", "0720301", "1"), &catalog).unwrap();
        assert_eq!(found.device_code, "0720301");
    }

    #[test]
    fn test_match_by_type_name_ignores_case() {
        let catalog = vec![definition("barcode_scanner", "BS", "Barcode Scanner", "02")];
        let found = find_definition(&item("BARCODE SCANNER", "0720301", "1"), &catalog).unwrap();
        assert_eq!(found.device_code, "barcode_scanner");
    }

    #[test]
    fn test_first_match_wins_in_catalog_order() {
        let catalog = vec![
            definition("display_a", "DISPLAY", "LCD", "01"),
            definition("display_b", "DSP", "DISPLAY", "02"),
        ];
        let found = find_definition(&item("DISPLAY", "DISP01", "1"), &catalog).unwrap();
        assert_eq!(found.device_code, "display_a");
    }

    #[test]
    fn test_exact_match_beats_shared_word() {
        let catalog = vec![
            definition("reader_prepaid", "RP", "READER PREPAID", "01"),
            definition("module_reader", "MR", "MODULE READER", "01"),
        ];
        let found = find_definition(&item("MODULE READER", "0120201", "1"), &catalog).unwrap();
        assert_eq!(found.device_code, "module_reader");
    }

    #[test]
    fn test_shared_word_never_shadows_a_later_exact_rule() {
        let fallback = definition("reader_prepaid", "RP", "READER PREPAID", "01");

        // Exact by model code, further down the catalog
        let catalog = vec![
            fallback.clone(),
            definition("display", "DSP", "DISPLAY", "01"),
            definition("0120201", "MR", "MR MODULE", "03"),
        ];
        let found = find_definition(&item("MODULE READER", "0120201", "1"), &catalog).unwrap();
        assert_eq!(found.device_code, "0120201");

        // Exact by type code
        let catalog = vec![
            fallback.clone(),
            definition("module_reader", "MODULE READER", "MRD", "02"),
        ];
        let found = find_definition(&item("MODULE READER", "", "1"), &catalog).unwrap();
        assert_eq!(found.device_code, "module_reader");

        // Exact by type name, case differs
        let catalog = vec![fallback, definition("module_reader", "MR", "Module Reader", "02")];
        let found = find_definition(&item("MODULE READER", "", "1"), &catalog).unwrap();
        assert_eq!(found.device_code, "module_reader");
    }

    #[test]
    fn test_shared_word_fallback() {
        let catalog = vec![
            definition("display", "DSP", "DISPLAY", "01"),
            definition("reader_prepaid", "RP", "READER PREPAID", "01"),
        ];
        let found = find_definition(&item("MODULE READER", "0120201", "1"), &catalog).unwrap();
        assert_eq!(found.device_code, "reader_prepaid");
    }

    #[test]
    fn test_no_match() {
        let catalog = vec![definition("display", "DSP", "DISPLAY", "01")];
        assert!(find_definition(&item("BARCODE SCANNER", "0720301", "1"), &catalog).is_none());
        assert!(find_definition(&item("", "", "1"), &catalog).is_none());
    }

    #[test]
    fn test_auto_match_is_deterministic() {
        let catalog = vec![
            definition("reader_prepaid", "RP", "READER PREPAID", "01"),
            definition("display", "DSP", "DISPLAY", "01"),
        ];
        let items = vec![
            item("MODULE READER", "0120201", "1071137441"),
            item("BARCODE SCANNER", "0720301", "1070037881"),
            item("DISPLAY", "DISP01", "SN-BARU-001"),
        ];

        let first = auto_match(&items, &catalog, "JUA");
        let second = auto_match(&items, &catalog, "JUA");
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(!first.contains_key(&1));
        assert_eq!(first[&2].device_name, "DISPLAY JUA 01");
    }

    fn registered(id: &str, code: &str, serial: &str) -> ExistingDevice {
        serde_json::from_value(serde_json::json!({
            "i_id": id,
            "c_device": code,
            "c_serial_number": serial,
            "c_device_type": "RQ",
            "n_device_name": "READER POSTPAID JUA 01",
            "c_direction": 1,
        }))
        .unwrap()
    }

    #[test]
    fn test_match_registered_by_serial() {
        let devices = vec![
            registered("d0", "display", ""),
            registered("d1", "reader_postpaid", "1071137441"),
        ];
        let items = vec![
            item("MODULE READER", "0120201", "1071137441"),
            item("MODULE READER", "0120201", " 1071137441 "),
            item("DISPLAY", "DISP01", ""),
        ];

        let proposals = match_registered(&items, &devices);
        assert_eq!(proposals.len(), 1);
        let decision = &proposals[&0];
        assert_eq!(decision.source_device_id.as_deref(), Some("d1"));
        assert_eq!(decision.device_code, "reader_postpaid");
        assert_eq!(decision.serial_number, "1071137441");
    }
}
