//! Reconciliation state
//!
//! Single source of truth for one open reconciliation: the incoming record,
//! the active target terminal, the per-key mapping decisions and the restore
//! set. Source records are held read-only; every operator edit lands in the
//! decision map or the restore set.

use std::collections::{BTreeMap, BTreeSet};

use errors::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::decision::MappingDecision;
use crate::key::MappingKey;
use crate::matcher::{auto_match, match_registered};
use crate::types::{DeviceDefinition, Direction, ExistingDevice, IncomingRecord, IncomingSubItem, TargetTerminal};

/// Display status of an incoming sub-item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// No decision yet, blocks submission
    Unmapped,
    /// Decision equals a device already on the terminal (code and serial)
    Match,
    /// Decision will create a new device record
    Create,
}

/// Display status of a device already on the target terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExistingStatus {
    /// Referenced by an incoming item's decision
    Matched,
    /// Not referenced and not restored, dropped on submit
    Unmatched,
    /// Restored as registered
    KeepExisting,
    /// Restored with an operator edit
    MappedManual,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Unmapped => "UNMAPPED",
            ItemStatus::Match => "MATCH",
            ItemStatus::Create => "CREATE",
        }
    }
}

impl ExistingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExistingStatus::Matched => "MATCHED",
            ExistingStatus::Unmatched => "UNMATCHED",
            ExistingStatus::KeepExisting => "KEEP_EXISTING",
            ExistingStatus::MappedManual => "MAPPED_MANUAL",
        }
    }
}

/// One incoming sub-item as rendered in the review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomingRow {
    pub key: MappingKey,
    pub item: IncomingSubItem,
    pub decision: Option<MappingDecision>,
    pub status: ItemStatus,
}

/// One device of the target terminal as rendered in the review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExistingRow {
    pub key: MappingKey,
    pub device: ExistingDevice,
    /// Operator edit for this device, kept even while the device is not restored
    pub decision: Option<MappingDecision>,
    pub restored: bool,
    pub status: ExistingStatus,
}

/// Per-status totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub unmapped: usize,
    pub matched: usize,
    pub create: usize,
    pub existing_matched: usize,
    pub unmatched: usize,
    pub keep_existing: usize,
    pub mapped_manual: usize,
}

/// Rendering model of the whole reconciliation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewReport {
    pub sync_id: String,
    pub item_serial_code: String,
    pub target: Option<TerminalSummary>,
    pub locked: bool,
    pub incoming: Vec<IncomingRow>,
    pub existing: Vec<ExistingRow>,
    pub counts: StatusCounts,
}

impl ReviewReport {
    /// Whether the assembler would accept the current state
    pub fn is_submittable(&self) -> bool {
        self.target.is_some() && self.counts.unmapped == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalSummary {
    pub id: String,
    pub label: String,
    pub device_count: usize,
}

#[derive(Debug, Clone)]
pub struct ReconciliationState {
    record: IncomingRecord,
    target: Option<TargetTerminal>,
    locked: bool,
    decisions: BTreeMap<MappingKey, MappingDecision>,
    /// Incoming indices whose decision is an unedited proposal
    proposed: BTreeSet<usize>,
    restore: BTreeSet<String>,
}

impl ReconciliationState {
    /// Start a reconciliation for `record`
    ///
    /// A terminal resolved by the backend locks the session to it. Sub-items
    /// whose serial is already registered on that terminal are proposed as
    /// takeovers right away.
    pub fn new(record: IncomingRecord, resolved: Option<TargetTerminal>) -> Self {
        let locked = resolved.is_some();
        let mut state = Self {
            record,
            target: resolved,
            locked,
            decisions: BTreeMap::new(),
            proposed: BTreeSet::new(),
            restore: BTreeSet::new(),
        };
        state.propose_registered();
        state
    }

    pub fn record(&self) -> &IncomingRecord {
        &self.record
    }

    pub fn items(&self) -> &[IncomingSubItem] {
        &self.record.items
    }

    pub fn target(&self) -> Option<&TargetTerminal> {
        self.target.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn decision(&self, key: &MappingKey) -> Option<&MappingDecision> {
        self.decisions.get(key)
    }

    pub fn is_restored(&self, device_id: &str) -> bool {
        self.restore.contains(device_id)
    }

    pub fn restore_set(&self) -> impl Iterator<Item = &str> {
        self.restore.iter().map(String::as_str)
    }

    // ========================================================================
    // Operator edits
    // ========================================================================

    /// Select the terminal to reconcile into
    ///
    /// Returns `false` without changing anything while the session is locked.
    ///
    /// On a change of terminal, decisions and restore entries keyed by the
    /// previous terminal's devices are discarded, and so are unedited
    /// proposals and takeovers of devices the new terminal does not carry.
    /// Manual catalog picks stay. Serial takeovers on the new terminal are
    /// proposed at once; catalog proposals need
    /// [`ReconciliationState::propose_mappings`] again.
    pub fn set_target_terminal(&mut self, terminal: TargetTerminal) -> bool {
        if self.locked {
            warn!(
                "Ignoring target change to {}: locked to {}",
                terminal.label(),
                self.target.as_ref().map(TargetTerminal::label).unwrap_or_default()
            );
            return false;
        }

        let changed = self.target.as_ref().map(|t| &t.id) != Some(&terminal.id);
        if changed {
            let proposed = std::mem::take(&mut self.proposed);
            self.decisions.retain(|key, decision| match key {
                MappingKey::Incoming(index) => {
                    !proposed.contains(index)
                        && !matches!(
                            decision.source_device_id.as_deref(),
                            Some(id) if terminal.device(id).is_none()
                        )
                },
                MappingKey::Existing(_) => false,
            });
            self.restore.clear();
        }
        debug!("Target terminal set to {}", terminal.label());
        self.target = Some(terminal);
        if changed {
            self.propose_registered();
        }
        true
    }

    fn check_key(&self, key: &MappingKey) -> SyncResult<()> {
        let known = match key {
            MappingKey::Incoming(index) => *index < self.record.items.len(),
            MappingKey::Existing(id) => self
                .target
                .as_ref()
                .is_some_and(|t| t.device(id).is_some()),
        };
        if known {
            Ok(())
        } else {
            Err(SyncError::UnknownKey(key.to_string()))
        }
    }

    /// Overwrite the decision for `key`
    ///
    /// A decision on an existing device also restores it.
    pub fn set_mapping(&mut self, key: MappingKey, decision: MappingDecision) -> SyncResult<()> {
        self.check_key(&key)?;
        match &key {
            MappingKey::Incoming(index) => {
                self.proposed.remove(index);
            },
            MappingKey::Existing(id) => {
                self.restore.insert(id.clone());
            },
        }
        debug!("Mapping {} -> {}", key, decision.device_code);
        self.decisions.insert(key, decision);
        Ok(())
    }

    /// Drop the decision for `key`; restore membership is untouched
    pub fn clear_mapping(&mut self, key: &MappingKey) -> Option<MappingDecision> {
        if let MappingKey::Incoming(index) = key {
            self.proposed.remove(index);
        }
        self.decisions.remove(key)
    }

    /// Flip restore membership of an existing device, returning the new state
    ///
    /// Any edited decision for the device is kept across toggles.
    pub fn toggle_restore(&mut self, device_id: &str) -> SyncResult<bool> {
        self.check_key(&MappingKey::existing(device_id))?;
        if self.restore.remove(device_id) {
            Ok(false)
        } else {
            self.restore.insert(device_id.to_string());
            Ok(true)
        }
    }

    /// Map an incoming item onto a catalog definition
    pub fn map_item_to_definition(
        &mut self,
        index: usize,
        definition: &DeviceDefinition,
        direction: Direction,
    ) -> SyncResult<()> {
        let item = self
            .record
            .items
            .get(index)
            .ok_or_else(|| SyncError::UnknownKey(MappingKey::incoming(index).to_string()))?;
        let decision = MappingDecision::from_definition(definition, item, &self.record.station_code)
            .with_direction(direction);
        self.set_mapping(MappingKey::incoming(index), decision)
    }

    /// Map an incoming item onto a device already on the target terminal
    pub fn map_item_to_existing(
        &mut self,
        index: usize,
        device_id: &str,
        direction: Option<Direction>,
    ) -> SyncResult<()> {
        let item = self
            .record
            .items
            .get(index)
            .ok_or_else(|| SyncError::UnknownKey(MappingKey::incoming(index).to_string()))?;
        let device = self
            .target
            .as_ref()
            .and_then(|t| t.device(device_id))
            .ok_or_else(|| SyncError::UnknownKey(device_id.to_string()))?;

        let mut decision = MappingDecision::from_existing_for_item(device, item);
        if let Some(direction) = direction {
            decision = decision.with_direction(direction);
        }
        self.set_mapping(MappingKey::incoming(index), decision)
    }

    /// Edit an existing device's direction and optionally its name
    ///
    /// Builds on a previous edit when there is one, which also restores the
    /// device.
    pub fn edit_existing(
        &mut self,
        device_id: &str,
        direction: Direction,
        name: Option<String>,
    ) -> SyncResult<()> {
        let key = MappingKey::existing(device_id);
        let base = match self.decisions.get(&key) {
            Some(previous) => previous.clone(),
            None => {
                let device = self
                    .target
                    .as_ref()
                    .and_then(|t| t.device(device_id))
                    .ok_or_else(|| SyncError::UnknownKey(device_id.to_string()))?;
                MappingDecision::from_existing(device)
            },
        };

        let mut decision = base.with_direction(direction);
        if let Some(name) = name {
            decision = decision.with_name(name);
        }
        self.set_mapping(key, decision)
    }

    /// Add auto-match proposals without touching keys that already hold a
    /// decision; returns how many were added
    pub fn merge_proposals(&mut self, proposals: BTreeMap<usize, MappingDecision>) -> usize {
        let mut added = 0;
        for (index, decision) in proposals {
            if index >= self.record.items.len() {
                continue;
            }
            if let std::collections::btree_map::Entry::Vacant(slot) =
                self.decisions.entry(MappingKey::incoming(index))
            {
                slot.insert(decision);
                self.proposed.insert(index);
                added += 1;
            }
        }
        added
    }

    /// Merge serial takeovers of devices on the current target
    pub fn propose_registered(&mut self) -> usize {
        let proposals = match &self.target {
            Some(terminal) => match_registered(&self.record.items, &terminal.devices),
            None => return 0,
        };
        self.merge_proposals(proposals)
    }

    /// Merge every automatic proposal: serial takeovers first, then the
    /// catalog for whatever is still unmapped
    pub fn propose_mappings(&mut self, catalog: &[DeviceDefinition]) -> usize {
        let registered = self.propose_registered();
        let proposals = auto_match(&self.record.items, catalog, &self.record.station_code);
        registered + self.merge_proposals(proposals)
    }

    /// Whether the decision at `index` is an auto proposal nobody edited
    pub fn is_proposed(&self, index: usize) -> bool {
        self.proposed.contains(&index)
    }

    // ========================================================================
    // Classification
    // ========================================================================

    fn target_devices(&self) -> &[ExistingDevice] {
        self.target.as_ref().map(|t| t.devices.as_slice()).unwrap_or_default()
    }

    /// Status of the incoming item at `index`
    pub fn classify(&self, index: usize) -> ItemStatus {
        let Some(item) = self.record.items.get(index) else {
            return ItemStatus::Unmapped;
        };
        match self.decisions.get(&MappingKey::incoming(index)) {
            None => ItemStatus::Unmapped,
            Some(decision) => {
                let exact = self.target_devices().iter().any(|device| {
                    device.device_code == decision.device_code
                        && device.serial_number == item.serial_number
                });
                if exact {
                    ItemStatus::Match
                } else {
                    ItemStatus::Create
                }
            },
        }
    }

    /// Whether an incoming decision designates `device`
    pub fn is_referenced(&self, device: &ExistingDevice) -> bool {
        self.decisions
            .iter()
            .any(|(key, decision)| key.is_incoming() && decision.refers_to(device))
    }

    /// Status of a device on the target terminal
    pub fn classify_existing(&self, device: &ExistingDevice) -> ExistingStatus {
        if self.is_referenced(device) {
            ExistingStatus::Matched
        } else if !self.restore.contains(&device.id) {
            ExistingStatus::Unmatched
        } else if self.decisions.contains_key(&MappingKey::existing(device.id.as_str())) {
            ExistingStatus::MappedManual
        } else {
            ExistingStatus::KeepExisting
        }
    }

    /// Indices of incoming items without a decision, in order
    pub fn unmapped_items(&self) -> Vec<usize> {
        (0..self.record.items.len())
            .filter(|index| !self.decisions.contains_key(&MappingKey::incoming(*index)))
            .collect()
    }

    pub fn review(&self) -> ReviewReport {
        let mut counts = StatusCounts::default();

        let incoming: Vec<IncomingRow> = self
            .record
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let key = MappingKey::incoming(index);
                let status = self.classify(index);
                match status {
                    ItemStatus::Unmapped => counts.unmapped += 1,
                    ItemStatus::Match => counts.matched += 1,
                    ItemStatus::Create => counts.create += 1,
                }
                IncomingRow {
                    decision: self.decisions.get(&key).cloned(),
                    key,
                    item: item.clone(),
                    status,
                }
            })
            .collect();

        let existing: Vec<ExistingRow> = self
            .target_devices()
            .iter()
            .map(|device| {
                let key = MappingKey::existing(device.id.as_str());
                let status = self.classify_existing(device);
                match status {
                    ExistingStatus::Matched => counts.existing_matched += 1,
                    ExistingStatus::Unmatched => counts.unmatched += 1,
                    ExistingStatus::KeepExisting => counts.keep_existing += 1,
                    ExistingStatus::MappedManual => counts.mapped_manual += 1,
                }
                ExistingRow {
                    decision: self.decisions.get(&key).cloned(),
                    restored: self.restore.contains(&device.id),
                    key,
                    device: device.clone(),
                    status,
                }
            })
            .collect();

        ReviewReport {
            sync_id: self.record.id.clone(),
            item_serial_code: self.record.item_serial_code.clone(),
            target: self.target.as_ref().map(|t| TerminalSummary {
                id: t.id.clone(),
                label: t.label(),
                device_count: t.devices.len(),
            }),
            locked: self.locked,
            incoming,
            existing,
            counts,
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::matcher::auto_match;
    use tracing_test::traced_test;

    fn sub_item(item_type: &str, code: &str, serial: &str) -> IncomingSubItem {
        IncomingSubItem {
            item_type: item_type.into(),
            model_code: code.into(),
            model_name: String::new(),
            serial_number: serial.into(),
            item_serial_code: String::new(),
        }
    }

    fn record(items: Vec<IncomingSubItem>) -> IncomingRecord {
        IncomingRecord {
            id: "sync-1".into(),
            item_serial_code: "072-1293".into(),
            model_code: None,
            model_name: "Magnetic-Gate MPP 122".into(),
            station_code: "JUA".into(),
            station_name: "JUANDA".into(),
            project: Some("KCI".into()),
            signature: None,
            items,
        }
    }

    fn device(id: &str, code: &str, serial: &str) -> ExistingDevice {
        ExistingDevice {
            id: id.into(),
            device_code: code.into(),
            serial_number: serial.into(),
            device_type_code: "RP".into(),
            device_name: format!("{} JUA", code),
            direction: Direction::In,
            project: Some("KCI".into()),
            terminal_serial: Some("072-1293".into()),
            active: true,
            sub_item_type: None,
            sub_item_code: None,
            sub_item_serial_code: None,
        }
    }

    fn terminal(id: &str, devices: Vec<ExistingDevice>) -> TargetTerminal {
        TargetTerminal {
            id: id.into(),
            terminal_serial: Some("072-1293".into()),
            terminal_type: "G10".into(),
            project: Some("KCI".into()),
            station: Some("JUA".into()),
            terminal_name: format!("GATE {}", id),
            devices,
        }
    }

    fn catalog() -> Vec<DeviceDefinition> {
        vec![DeviceDefinition {
            device_code: "reader_prepaid".into(),
            device_type_code: "RP".into(),
            device_type_name: "READER PREPAID".into(),
            project: Some("KCI".into()),
            sequence_number: "01".into(),
        }]
    }

    #[test]
    #[traced_test]
    fn test_lock_ignores_target_changes() {
        let resolved = terminal("t1", vec![]);
        let mut state = ReconciliationState::new(record(vec![]), Some(resolved));
        assert!(state.is_locked());
        assert!(!state.set_target_terminal(terminal("t2", vec![])));
        assert_eq!(state.target().unwrap().id, "t1");
        assert!(logs_contain("Ignoring target change"));
    }

    #[test]
    fn test_unlocked_retarget_drops_device_keyed_edits() {
        let items = vec![sub_item("MODULE READER", "0120201", "1071137441")];
        let mut state = ReconciliationState::new(record(items), None);
        assert!(state.set_target_terminal(terminal("t1", vec![device("d1", "x", "1")])));

        state.merge_proposals(auto_match(state.items(), &catalog(), "JUA"));
        state.edit_existing("d1", Direction::Out, None).unwrap();
        assert!(state.is_restored("d1"));

        assert!(state.set_target_terminal(terminal("t2", vec![])));
        assert!(state.decision(&MappingKey::existing("d1")).is_none());
        assert!(!state.is_restored("d1"));

        // Unedited proposals are re-derived for the new terminal
        assert!(state.decision(&MappingKey::incoming(0)).is_none());
        assert_eq!(state.propose_mappings(&catalog()), 1);
        assert!(state.is_proposed(0));
    }

    #[test]
    fn test_retarget_keeps_manual_picks_and_drops_foreign_takeovers() {
        let items = vec![
            sub_item("MODULE READER", "0120201", "1071137441"),
            sub_item("MODULE READER", "0120201", "2000"),
        ];
        let mut state = ReconciliationState::new(record(items), None);
        assert!(state.set_target_terminal(terminal("t1", vec![device("d1", "x", "1")])));

        state.map_item_to_definition(0, &catalog()[0], Direction::In).unwrap();
        state.map_item_to_existing(1, "d1", None).unwrap();
        assert!(!state.is_proposed(0));

        assert!(state.set_target_terminal(terminal("t2", vec![])));
        assert_eq!(
            state.decision(&MappingKey::incoming(0)).unwrap().direction,
            Direction::In
        );
        assert!(state.decision(&MappingKey::incoming(1)).is_none());
    }

    #[test]
    fn test_registered_serial_is_taken_over_before_catalog() {
        let items = vec![
            sub_item("MODULE READER", "0120201", "1071137441"),
            sub_item("MODULE READER", "0120201", "2000"),
        ];
        let resolved = terminal("t1", vec![device("d1", "reader_postpaid", "1071137441")]);
        let mut state = ReconciliationState::new(record(items), Some(resolved));

        // Takeover proposed on construction, catalog fills the rest
        assert_eq!(state.propose_mappings(&catalog()), 1);
        assert_eq!(state.propose_mappings(&catalog()), 0);

        let decision = state.decision(&MappingKey::incoming(0)).unwrap();
        assert_eq!(decision.source_device_id.as_deref(), Some("d1"));
        assert_eq!(decision.device_code, "reader_postpaid");
        assert_eq!(state.classify(0), ItemStatus::Match);
        assert_eq!(state.classify(1), ItemStatus::Create);
        assert_eq!(
            state.classify_existing(&state.target().unwrap().devices[0]),
            ExistingStatus::Matched
        );
    }

    #[test]
    fn test_retarget_proposes_takeovers_on_new_terminal() {
        let items = vec![sub_item("MODULE READER", "0120201", "1071137441")];
        let mut state = ReconciliationState::new(record(items), None);
        state.propose_mappings(&catalog());
        assert_eq!(
            state.decision(&MappingKey::incoming(0)).unwrap().device_code,
            "reader_prepaid"
        );

        let t1 = terminal("t1", vec![device("d1", "reader_postpaid", "1071137441")]);
        assert!(state.set_target_terminal(t1));
        state.propose_mappings(&catalog());

        let decision = state.decision(&MappingKey::incoming(0)).unwrap();
        assert_eq!(decision.source_device_id.as_deref(), Some("d1"));
        assert_eq!(state.classify(0), ItemStatus::Match);
    }

    #[test]
    fn test_classification() {
        let items = vec![
            sub_item("MODULE READER", "0120201", "1071137441"),
            sub_item("MODULE READER", "0120201", "2000"),
            sub_item("BARCODE SCANNER", "0720301", "1070037881"),
        ];
        let resolved = terminal("t1", vec![device("d1", "reader_prepaid", "1071137441")]);
        let mut state = ReconciliationState::new(record(items), Some(resolved));
        state.merge_proposals(auto_match(state.items(), &catalog(), "JUA"));

        assert_eq!(state.classify(0), ItemStatus::Match);
        assert_eq!(state.classify(1), ItemStatus::Create);
        assert_eq!(state.classify(2), ItemStatus::Unmapped);
        assert_eq!(state.classify(9), ItemStatus::Unmapped);
        assert_eq!(state.unmapped_items(), vec![2]);
    }

    #[test]
    fn test_existing_statuses() {
        let items = vec![sub_item("MODULE READER", "0120201", "1071137441")];
        let resolved = terminal(
            "t1",
            vec![
                device("d1", "reader_prepaid", "1071137441"),
                device("d2", "display", "A"),
                device("d3", "display", "B"),
                device("d4", "display", "C"),
            ],
        );
        let mut state = ReconciliationState::new(record(items), Some(resolved));
        state.merge_proposals(auto_match(state.items(), &catalog(), "JUA"));
        assert!(state.toggle_restore("d3").unwrap());
        state.edit_existing("d4", Direction::Out, Some("DISPLAY JUA 09".into())).unwrap();

        let report = state.review();
        let statuses: Vec<_> = report.existing.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                ExistingStatus::Matched,
                ExistingStatus::Unmatched,
                ExistingStatus::KeepExisting,
                ExistingStatus::MappedManual,
            ]
        );
        assert_eq!(report.counts.unmatched, 1);
        assert_eq!(report.counts.matched, 1);
        assert!(report.is_submittable());
    }

    #[test]
    fn test_restore_toggle_keeps_edit() {
        let resolved = terminal("t1", vec![device("d1", "display", "A")]);
        let mut state = ReconciliationState::new(record(vec![]), Some(resolved));
        state.edit_existing("d1", Direction::Out, None).unwrap();

        assert!(!state.toggle_restore("d1").unwrap());
        assert_eq!(state.classify_existing(&state.target().unwrap().devices[0]), ExistingStatus::Unmatched);
        assert!(state.toggle_restore("d1").unwrap());

        let decision = state.decision(&MappingKey::existing("d1")).unwrap();
        assert_eq!(decision.direction, Direction::Out);
    }

    #[test]
    fn test_manual_edit_survives_rematch() {
        let items = vec![sub_item("MODULE READER", "0120201", "1071137441")];
        let mut state = ReconciliationState::new(record(items), None);
        let manual = DeviceDefinition {
            device_code: "reader_postpaid".into(),
            device_type_code: "RQ".into(),
            device_type_name: "READER POSTPAID".into(),
            project: None,
            sequence_number: "02".into(),
        };
        state.map_item_to_definition(0, &manual, Direction::In).unwrap();

        assert_eq!(state.merge_proposals(auto_match(state.items(), &catalog(), "JUA")), 0);
        assert_eq!(state.merge_proposals(auto_match(state.items(), &catalog(), "JUA")), 0);
        let decision = state.decision(&MappingKey::incoming(0)).unwrap();
        assert_eq!(decision.device_code, "reader_postpaid");
        assert_eq!(decision.device_name, "READER POSTPAID JUA 02");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let mut state = ReconciliationState::new(record(vec![]), Some(terminal("t1", vec![])));
        let decision = MappingDecision::from_definition(
            &catalog()[0],
            &sub_item("MODULE READER", "0120201", "1"),
            "JUA",
        );
        assert!(matches!(
            state.set_mapping(MappingKey::incoming(0), decision.clone()),
            Err(SyncError::UnknownKey(_))
        ));
        assert!(state.set_mapping(MappingKey::existing("ghost"), decision).is_err());
        assert!(state.toggle_restore("ghost").is_err());
    }

    #[test]
    fn test_map_item_to_existing_device() {
        let items = vec![sub_item("MODULE READER", "0120201", "NEW-SN")];
        let resolved = terminal("t1", vec![device("d1", "reader_prepaid", "OLD-SN")]);
        let mut state = ReconciliationState::new(record(items), Some(resolved));

        state.map_item_to_existing(0, "d1", None).unwrap();
        let decision = state.decision(&MappingKey::incoming(0)).unwrap();
        assert_eq!(decision.source_device_id.as_deref(), Some("d1"));
        assert_eq!(decision.serial_number, "NEW-SN");
        assert_eq!(decision.direction, Direction::In);
        assert_eq!(state.classify(0), ItemStatus::Create);
        assert_eq!(
            state.classify_existing(&state.target().unwrap().devices[0]),
            ExistingStatus::Matched
        );
    }
}
