//! Data access interface to the registry backend
//!
//! The engine only talks to the registry through [`SyncBackend`], so tests
//! inject [`crate::MemoryBackend`] and production code uses
//! [`crate::HttpBackend`].

use async_trait::async_trait;
use errors::SyncResult;
use serde::{Deserialize, Serialize};

use crate::assembler::SyncSubmission;
use crate::inbox::PendingSync;
use crate::types::{DeviceDefinition, SyncDetail, TargetTerminal};

/// Identifies the incoming sync record to reconcile
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetailRequest {
    /// Item serial code reported by the scanned terminal
    #[serde(rename = "serialNumber")]
    pub serial_number: String,
    /// Tenant; the configured default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Sync correlation id when opened from the inbox
    #[serde(rename = "syncId", default, skip_serializing_if = "Option::is_none")]
    pub sync_id: Option<String>,
}

impl DetailRequest {
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            project: None,
            sync_id: None,
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_sync_id(mut self, sync_id: impl Into<String>) -> Self {
        self.sync_id = Some(sync_id.into());
        self
    }
}

/// Backend acknowledgement of a persisted reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub status: String,
    pub message: Option<String>,
    /// Number of devices sent
    pub device_count: usize,
}

/// Registry operations the reconciliation workflow depends on
///
/// Implementations:
/// - `HttpBackend`: the registry REST API
/// - `MemoryBackend`: in-memory fake for tests
#[async_trait]
pub trait SyncBackend: Send + Sync + 'static {
    /// Incoming record plus the terminal resolved for its serial, in one call
    async fn fetch_sync_detail(&self, request: &DetailRequest) -> SyncResult<SyncDetail>;

    /// Unassigned terminals of a project
    async fn fetch_free_terminals(&self, project: &str) -> SyncResult<Vec<TargetTerminal>>;

    /// Device-definition catalog of a project
    async fn fetch_device_catalog(&self, project: &str) -> SyncResult<Vec<DeviceDefinition>>;

    /// Persist a reconciled terminal
    async fn submit_reconciliation(&self, submission: &SyncSubmission) -> SyncResult<SubmitReceipt>;

    /// Incoming sync records awaiting review
    async fn list_pending_syncs(&self, project: &str) -> SyncResult<Vec<PendingSync>>;
}
