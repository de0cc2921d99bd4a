//! Payload assembler
//!
//! Turns the current reconciliation state into the submission the registry
//! persists. Entries are built field by field from decisions, so nothing
//! from the loaded records leaks onto the wire unless listed here.

use std::collections::HashSet;

use errors::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decision::MappingDecision;
use crate::key::MappingKey;
use crate::state::ReconciliationState;
use crate::types::Direction;

/// Model code sent when the incoming record carries none
pub const DEFAULT_MODEL_CODE: &str = "000000";

/// One device of the reconciled terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePayloadEntry {
    /// Registry id when the entry updates an existing device
    #[serde(rename = "i_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "c_device")]
    pub device_code: String,
    #[serde(rename = "c_serial_number")]
    pub serial_number: String,
    #[serde(rename = "c_device_type")]
    pub device_type_code: String,
    #[serde(rename = "c_direction")]
    pub direction: Direction,
    #[serde(rename = "n_device_name")]
    pub device_name: String,
    #[serde(rename = "c_project", default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(rename = "c_sub_item_type", default, skip_serializing_if = "Option::is_none")]
    pub sub_item_type: Option<String>,
    #[serde(rename = "c_sub_item_code", default, skip_serializing_if = "Option::is_none")]
    pub sub_item_code: Option<String>,
    #[serde(
        rename = "c_sub_item_serial_code",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sub_item_serial_code: Option<String>,
}

impl DevicePayloadEntry {
    pub fn from_decision(decision: &MappingDecision) -> Self {
        Self {
            id: decision.source_device_id.clone(),
            device_code: decision.device_code.clone(),
            serial_number: decision.serial_number.clone(),
            device_type_code: decision.device_type_code.clone(),
            direction: decision.direction,
            device_name: decision.device_name.clone(),
            project: decision.project.clone(),
            sub_item_type: decision.sub_item_type.clone(),
            sub_item_code: decision.sub_item_code.clone(),
            sub_item_serial_code: decision.sub_item_serial_code.clone(),
        }
    }
}

/// Reconciled terminal as sent to the submit endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSubmission {
    #[serde(rename = "i_terminal_id")]
    pub terminal_id: String,
    #[serde(rename = "c_project")]
    pub project: String,
    #[serde(rename = "c_terminal_sn")]
    pub terminal_serial: Option<String>,
    #[serde(rename = "n_terminal_name")]
    pub terminal_name: String,
    #[serde(rename = "c_signature")]
    pub signature: Option<String>,
    #[serde(rename = "i_sync_id")]
    pub sync_id: String,
    #[serde(rename = "c_model_code")]
    pub model_code: String,
    #[serde(rename = "c_model_name")]
    pub model_name: String,
    #[serde(rename = "c_item_serial_code")]
    pub item_serial_code: String,
    pub devices: Vec<DevicePayloadEntry>,
}

/// Build the submission for the current state
///
/// Fails without side effects when no target terminal is selected or any
/// incoming item is still unmapped. `default_project` is used when neither
/// the terminal nor the incoming record names a project.
pub fn assemble(state: &ReconciliationState, default_project: &str) -> SyncResult<SyncSubmission> {
    let terminal = state.target().ok_or(SyncError::NoTargetTerminal)?;

    let unmapped = state.unmapped_items();
    if !unmapped.is_empty() {
        return Err(SyncError::IncompleteMapping { unmapped });
    }

    let mut devices = Vec::with_capacity(state.items().len() + terminal.devices.len());
    // Serials carried by incoming items; blank serials identify nothing
    let mut incoming_serials = HashSet::new();

    // Incoming items, in reported order
    for index in 0..state.items().len() {
        let decision = state
            .decision(&MappingKey::incoming(index))
            .ok_or_else(|| SyncError::IncompleteMapping {
                unmapped: vec![index],
            })?;
        if !decision.serial_number.trim().is_empty() {
            incoming_serials.insert(decision.serial_number.trim().to_string());
        }
        devices.push(DevicePayloadEntry::from_decision(decision));
    }

    // Restored devices not already carried by an incoming item
    for device in &terminal.devices {
        if state.is_referenced(device) || incoming_serials.contains(device.serial_number.trim()) {
            continue;
        }
        if !state.is_restored(&device.id) {
            debug!("Dropping unmatched device {} ({})", device.id, device.device_name);
            continue;
        }

        let entry = match state.decision(&MappingKey::existing(device.id.as_str())) {
            Some(edited) => DevicePayloadEntry::from_decision(edited),
            None => DevicePayloadEntry::from_decision(
                &MappingDecision::from_existing(device).with_direction(Direction::None),
            ),
        };
        devices.push(entry);
    }

    let record = state.record();
    let project = terminal
        .project
        .clone()
        .or_else(|| record.project.clone())
        .unwrap_or_else(|| default_project.to_string());

    Ok(SyncSubmission {
        terminal_id: terminal.id.clone(),
        project,
        terminal_serial: terminal.terminal_serial.clone(),
        terminal_name: terminal.terminal_name.clone(),
        signature: record.signature.clone(),
        sync_id: record.id.clone(),
        model_code: record
            .model_code
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL_CODE.to_string()),
        model_name: record.model_name.clone(),
        item_serial_code: record.item_serial_code.clone(),
        devices,
    })
}
