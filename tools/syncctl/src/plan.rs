//! Operator plan files
//!
//! A plan records the decisions an operator would make in the detail view,
//! so a reconciliation can be reviewed and replayed from the command line:
//!
//! ```yaml
//! target: free-1              # free terminal id, unlocked sessions only
//! mappings:
//!   incoming-0:
//!     device: reader_prepaid  # catalog device code
//!     direction: IN
//!   incoming-1:
//!     existing: dev-2         # device already on the target terminal
//!   dev-9:                    # edit an existing device (restores it)
//!     direction: OUT
//!     name: DISPLAY JUA 09
//! restore: [dev-3]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use errors::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use terminal_sync::{Direction, MappingKey, SyncBackend, SyncSession};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanEntry {
    /// Catalog device code
    #[serde(default)]
    pub device: Option<String>,
    /// Existing device id on the target terminal
    #[serde(default)]
    pub existing: Option<String>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconciliationPlan {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub mappings: BTreeMap<MappingKey, PlanEntry>,
    #[serde(default)]
    pub restore: Vec<String>,
}

impl ReconciliationPlan {
    /// Read a plan; `.json` files are JSON, anything else YAML
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let plan = if is_json {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_none() && self.mappings.is_empty() && self.restore.is_empty()
    }

    /// Apply the plan to a loaded session, in order: target, mappings, restore
    pub async fn apply<B: SyncBackend>(&self, session: &mut SyncSession<B>) -> SyncResult<()> {
        if let Some(target) = &self.target {
            session.select_target(target).await?;
        }

        for (key, entry) in &self.mappings {
            apply_entry(session, key, entry)?;
        }

        for device_id in &self.restore {
            let state = session.state_mut()?;
            if !state.is_restored(device_id) {
                state.toggle_restore(device_id)?;
            }
        }

        Ok(())
    }
}

fn apply_entry<B: SyncBackend>(
    session: &mut SyncSession<B>,
    key: &MappingKey,
    entry: &PlanEntry,
) -> SyncResult<()> {
    debug!("Applying plan entry {}", key);

    match key {
        MappingKey::Incoming(index) => {
            match (&entry.device, &entry.existing) {
                (Some(_), Some(_)) => {
                    return Err(SyncError::Validation(format!(
                        "{}: use either 'device' or 'existing', not both",
                        key
                    )))
                },
                (Some(code), None) => {
                    let definition = session
                        .definition(code)
                        .cloned()
                        .ok_or_else(|| SyncError::not_found(format!("device definition {}", code)))?;
                    session.state_mut()?.map_item_to_definition(
                        *index,
                        &definition,
                        entry.direction.unwrap_or_default(),
                    )?;
                },
                (None, Some(device_id)) => {
                    session
                        .state_mut()?
                        .map_item_to_existing(*index, device_id, entry.direction)?;
                },
                (None, None) => {
                    // Adjust the current (usually auto-matched) decision
                    let state = session.state_mut()?;
                    let mut decision = state.decision(key).cloned().ok_or_else(|| {
                        SyncError::Validation(format!("{}: no decision to adjust", key))
                    })?;
                    if let Some(direction) = entry.direction {
                        decision = decision.with_direction(direction);
                    }
                    state.set_mapping(key.clone(), decision)?;
                },
            }

            if let Some(name) = &entry.name {
                let state = session.state_mut()?;
                if let Some(decision) = state.decision(key).cloned() {
                    state.set_mapping(key.clone(), decision.with_name(name.clone()))?;
                }
            }
        },
        MappingKey::Existing(device_id) => {
            if entry.device.is_some() || entry.existing.is_some() {
                return Err(SyncError::Validation(format!(
                    "{}: existing devices only take 'direction' and 'name'",
                    key
                )));
            }
            let state = session.state_mut()?;
            let direction = entry
                .direction
                .or_else(|| state.decision(key).map(|d| d.direction))
                .unwrap_or_default();
            state.edit_existing(device_id, direction, entry.name.clone())?;
        },
    }

    Ok(())
}
