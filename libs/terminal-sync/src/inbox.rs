//! Pending-sync inbox
//!
//! Incoming sync records waiting for an operator, as listed by the registry.
//! A record whose serial already resolves to a registered terminal is
//! `MATCH`; everything else is pending.

use chrono::{DateTime, Utc};
use common::serde_helpers::{bool_true, deserialize_bool_flexible, deserialize_optional_string, deserialize_string_lenient};
use serde::{Deserialize, Deserializer, Serialize};

use crate::backend::DetailRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Match,
    NotMatch,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureStatus {
    SignatureValid,
    SignatureInvalid,
    SignatureNotIdentic,
    #[serde(other)]
    Unknown,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Match => "MATCH",
            MatchStatus::NotMatch => "NOT_MATCH",
            MatchStatus::Unknown => "UNKNOWN",
        }
    }
}

impl SignatureStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureStatus::SignatureValid => "SIGNATURE_VALID",
            SignatureStatus::SignatureInvalid => "SIGNATURE_INVALID",
            SignatureStatus::SignatureNotIdentic => "SIGNATURE_NOT_IDENTIC",
            SignatureStatus::Unknown => "UNKNOWN",
        }
    }
}

fn default_match_status() -> MatchStatus {
    MatchStatus::NotMatch
}

/// Unparseable timestamps are treated as missing
fn deserialize_sync_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }))
}

/// One row of the inbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSync {
    #[serde(deserialize_with = "deserialize_string_lenient")]
    pub sync_id: String,
    #[serde(default, deserialize_with = "deserialize_string_lenient")]
    pub item_serial_code: String,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub model_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_lenient")]
    pub model_name: String,
    #[serde(default, deserialize_with = "deserialize_string_lenient")]
    pub station_code: String,
    #[serde(default, deserialize_with = "deserialize_string_lenient")]
    pub station_name: String,
    #[serde(rename = "d_sync", default, deserialize_with = "deserialize_sync_date")]
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(rename = "b_mapping", default, deserialize_with = "deserialize_bool_flexible")]
    pub mapping: bool,
    #[serde(
        rename = "b_active",
        default = "bool_true",
        deserialize_with = "deserialize_bool_flexible"
    )]
    pub active: bool,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub terminal_id: Option<String>,
    #[serde(rename = "c_terminal_sn", default, deserialize_with = "deserialize_optional_string")]
    pub terminal_serial: Option<String>,
    #[serde(rename = "c_project", default, deserialize_with = "deserialize_optional_string")]
    pub project: Option<String>,
    #[serde(rename = "c_station", default, deserialize_with = "deserialize_optional_string")]
    pub station: Option<String>,
    #[serde(rename = "c_terminal_type", default, deserialize_with = "deserialize_optional_string")]
    pub terminal_type: Option<String>,
    #[serde(default = "default_match_status")]
    pub match_status: MatchStatus,
    #[serde(default)]
    pub signature_status: Option<SignatureStatus>,
}

impl PendingSync {
    pub fn is_pending(&self) -> bool {
        self.match_status == MatchStatus::NotMatch
    }

    /// Request that opens this row in a reconciliation session
    pub fn detail_request(&self) -> DetailRequest {
        let mut request =
            DetailRequest::new(self.item_serial_code.clone()).with_sync_id(self.sync_id.clone());
        request.project = self.project.clone().or_else(|| self.client_name.clone());
        request
    }

    fn matches_text(&self, needle: &str) -> bool {
        [
            Some(self.item_serial_code.as_str()),
            Some(self.model_name.as_str()),
            self.model_code.as_deref(),
            Some(self.station_code.as_str()),
            Some(self.station_name.as_str()),
            self.client_name.as_deref(),
            self.project.as_deref(),
            self.terminal_serial.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Inbox rows, newest sync first
#[derive(Debug, Clone, Default)]
pub struct SyncInbox {
    rows: Vec<PendingSync>,
}

impl SyncInbox {
    pub fn new(mut rows: Vec<PendingSync>) -> Self {
        // None sorts lowest, so undated rows end up last
        rows.sort_by(|a, b| b.synced_at.cmp(&a.synced_at));
        Self { rows }
    }

    pub fn rows(&self) -> &[PendingSync] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows not yet matched to a registered terminal
    pub fn pending_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_pending()).count()
    }

    /// Case-insensitive substring search; blank text keeps every row
    pub fn filter(&self, text: &str) -> Vec<&PendingSync> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return self.rows.iter().collect();
        }
        self.rows
            .iter()
            .filter(|row| row.matches_text(&needle))
            .collect()
    }

    /// Row by sync id or item serial code
    pub fn find(&self, id_or_serial: &str) -> Option<&PendingSync> {
        self.rows
            .iter()
            .find(|row| row.sync_id == id_or_serial || row.item_serial_code == id_or_serial)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<PendingSync> {
        serde_json::from_value(json!([
            {
                "sync_id": "a646fb58",
                "item_serial_code": "072-1293",
                "client_name": "KCI",
                "model_code": "0110501",
                "model_name": "Magnetic-Gate MPP 122",
                "station_code": "JUA",
                "station_name": "JUANDA",
                "d_sync": "2026-02-10T10:39:00.269Z",
                "b_mapping": false,
                "b_active": true,
                "terminal_id": "8bf3a7fe",
                "c_terminal_sn": "072-1293",
                "c_project": "KCI",
                "match_status": "MATCH",
                "signature_status": "SIGNATURE_NOT_IDENTIC"
            },
            {
                "sync_id": "b1",
                "item_serial_code": "072-9999",
                "client_name": "KCI",
                "model_name": "Magnetic-Gate MPP 122",
                "station_code": "MRI",
                "station_name": "MANGGARAI",
                "d_sync": "2026-02-11T08:00:00Z",
                "terminal_id": null,
                "match_status": "NOT_MATCH",
                "signature_status": null
            },
            {
                "sync_id": "c1",
                "item_serial_code": "073-0001",
                "station_name": "TANAH ABANG",
                "d_sync": "not a date",
                "match_status": "NOT_MATCH"
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_pending_count_and_order() {
        let inbox = SyncInbox::new(rows());
        assert_eq!(inbox.len(), 3);
        assert_eq!(inbox.pending_count(), 2);

        let order: Vec<_> = inbox.rows().iter().map(|r| r.sync_id.as_str()).collect();
        assert_eq!(order, vec!["b1", "a646fb58", "c1"]);
        assert_eq!(inbox.rows()[2].synced_at, None);
    }

    #[test]
    fn test_filter() {
        let inbox = SyncInbox::new(rows());
        assert_eq!(inbox.filter("juanda").len(), 1);
        assert_eq!(inbox.filter("mpp").len(), 2);
        assert_eq!(inbox.filter("  ").len(), 3);
        assert!(inbox.filter("bandung").is_empty());
    }

    #[test]
    fn test_statuses_and_request() {
        let inbox = SyncInbox::new(rows());
        let row = inbox.find("072-1293").unwrap();
        assert_eq!(row.signature_status, Some(SignatureStatus::SignatureNotIdentic));
        assert!(!row.is_pending());

        let request = row.detail_request();
        assert_eq!(request.serial_number, "072-1293");
        assert_eq!(request.project.as_deref(), Some("KCI"));
        assert_eq!(request.sync_id.as_deref(), Some("a646fb58"));

        let request = inbox.find("c1").unwrap().detail_request();
        assert_eq!(request.project, None);
    }
}
