//! Registry backend envelope types
//!
//! Every registry endpoint answers `{ "data": <payload> }`. Failures reuse the
//! same envelope with `data` set to `{ "code": "..", "msg": ".." }`, and write
//! endpoints report `{ "data": { "status": "00", "msg": ".." } }`.

use errors::{SyncError, SyncResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Status value the backend uses for a successful write
pub const WRITE_STATUS_OK: &str = "00";

/// Raw `{ "data": ... }` envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendEnvelope {
    #[serde(default)]
    pub data: Value,
}

/// Backend-reported failure carried inside `data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendFailure {
    #[serde(deserialize_with = "crate::serde_helpers::deserialize_string_lenient")]
    pub code: String,
    #[serde(default, alias = "message")]
    pub msg: Option<String>,
}

/// Write acknowledgement carried inside `data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteStatus {
    #[serde(deserialize_with = "crate::serde_helpers::deserialize_string_lenient")]
    pub status: String,
    #[serde(default, alias = "message")]
    pub msg: Option<String>,
}

impl WriteStatus {
    pub fn is_ok(&self) -> bool {
        self.status == WRITE_STATUS_OK
    }
}

impl BackendEnvelope {
    /// Failure object in place of a payload, if any
    pub fn failure(&self) -> Option<BackendFailure> {
        match &self.data {
            Value::Object(map) if map.contains_key("code") && !map.contains_key("status") => {
                serde_json::from_value(self.data.clone()).ok()
            },
            _ => None,
        }
    }

    /// Decode a single-object payload
    pub fn into_payload<T: DeserializeOwned>(self, endpoint: &str) -> SyncResult<T> {
        if let Some(failure) = self.failure() {
            return Err(SyncError::Backend {
                code: failure.code,
                message: failure.msg.unwrap_or_else(|| "data not found".to_string()),
            });
        }
        if self.data.is_null() {
            return Err(SyncError::UnexpectedPayload {
                endpoint: endpoint.to_string(),
                reason: "missing data".to_string(),
            });
        }
        serde_json::from_value(self.data).map_err(|e| SyncError::UnexpectedPayload {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    /// Decode a list payload; a failure object or null means "no rows"
    pub fn into_list<T: DeserializeOwned>(self, endpoint: &str) -> SyncResult<Vec<T>> {
        if let Some(failure) = self.failure() {
            debug!(
                "{} returned code {} ({}), treating as empty",
                endpoint,
                failure.code,
                failure.msg.as_deref().unwrap_or("-")
            );
            return Ok(Vec::new());
        }
        if self.data.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(self.data).map_err(|e| SyncError::UnexpectedPayload {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    /// Decode a write acknowledgement; anything but status `00` is an error
    pub fn into_write_status(self, endpoint: &str) -> SyncResult<WriteStatus> {
        if let Some(failure) = self.failure() {
            return Err(SyncError::Backend {
                code: failure.code,
                message: failure.msg.unwrap_or_default(),
            });
        }
        let status: WriteStatus =
            serde_json::from_value(self.data).map_err(|e| SyncError::UnexpectedPayload {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        if status.is_ok() {
            Ok(status)
        } else {
            Err(SyncError::Backend {
                code: status.status,
                message: status.msg.unwrap_or_else(|| "request rejected".to_string()),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Station {
        c_station: String,
    }

    fn envelope(value: Value) -> BackendEnvelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_list_payload() {
        let rows: Vec<Station> = envelope(json!({ "data": [{ "c_station": "JUA" }] }))
            .into_list("all-station")
            .unwrap();
        assert_eq!(rows, vec![Station { c_station: "JUA".into() }]);
    }

    #[test]
    fn test_list_failure_is_empty() {
        let rows: Vec<Station> = envelope(json!({ "data": { "code": "01", "msg": "not found" } }))
            .into_list("all-station")
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_payload_failure_is_backend_error() {
        let result: SyncResult<Station> =
            envelope(json!({ "data": { "code": 1, "msg": "not found" } })).into_payload("detail");
        match result {
            Err(SyncError::Backend { code, message }) => {
                assert_eq!(code, "1");
                assert_eq!(message, "not found");
            },
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_shape_mismatch() {
        let result: SyncResult<Station> =
            envelope(json!({ "data": { "station": 3 } })).into_payload("detail");
        assert!(matches!(result, Err(SyncError::UnexpectedPayload { .. })));
    }

    #[test]
    fn test_write_status() {
        let ok = envelope(json!({ "data": { "status": "00", "msg": "ok" } }))
            .into_write_status("submit")
            .unwrap();
        assert!(ok.is_ok());

        let rejected =
            envelope(json!({ "data": { "status": "05", "msg": "terminal busy" } }))
                .into_write_status("submit");
        assert!(matches!(rejected, Err(SyncError::Backend { .. })));
    }
}
