//! In-memory registry backend
//!
//! Seeded by tests and demos, counts every call, and can be told to fail a
//! given call or to hold the detail response until released.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use errors::{SyncError, SyncResult};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use crate::assembler::SyncSubmission;
use crate::backend::{DetailRequest, SubmitReceipt, SyncBackend};
use crate::inbox::PendingSync;
use crate::types::{DeviceDefinition, SyncDetail, TargetTerminal};

/// Backend operation, for counters and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendCall {
    SyncDetail,
    FreeTerminals,
    DeviceCatalog,
    Submit,
    PendingSyncs,
}

#[derive(Default)]
struct Registry {
    details: HashMap<String, SyncDetail>,
    free_terminals: HashMap<String, Vec<TargetTerminal>>,
    catalogs: HashMap<String, Vec<DeviceDefinition>>,
    pending: HashMap<String, Vec<PendingSync>>,
}

/// In-memory [`SyncBackend`]
#[derive(Default)]
pub struct MemoryBackend {
    registry: RwLock<Registry>,
    submissions: Mutex<Vec<SyncSubmission>>,
    calls: Mutex<HashMap<BackendCall, usize>>,
    failures: Mutex<HashMap<BackendCall, String>>,
    detail_gate: Mutex<Option<Arc<Notify>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the detail answer for `serial_number`
    pub fn insert_detail(&self, serial_number: impl Into<String>, detail: SyncDetail) {
        self.registry.write().details.insert(serial_number.into(), detail);
    }

    pub fn set_free_terminals(&self, project: impl Into<String>, terminals: Vec<TargetTerminal>) {
        self.registry
            .write()
            .free_terminals
            .insert(project.into(), terminals);
    }

    pub fn set_catalog(&self, project: impl Into<String>, catalog: Vec<DeviceDefinition>) {
        self.registry.write().catalogs.insert(project.into(), catalog);
    }

    pub fn set_pending(&self, project: impl Into<String>, rows: Vec<PendingSync>) {
        self.registry.write().pending.insert(project.into(), rows);
    }

    /// Make every following `call` fail with a fetch error
    pub fn fail(&self, call: BackendCall, reason: impl Into<String>) {
        self.failures.lock().insert(call, reason.into());
    }

    /// Stop failing `call`
    pub fn recover(&self, call: BackendCall) {
        self.failures.lock().remove(&call);
    }

    /// Hold detail responses until the returned handle is notified
    pub fn hold_detail(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.detail_gate.lock() = Some(gate.clone());
        gate
    }

    /// Number of times `call` reached the backend
    pub fn calls(&self, call: BackendCall) -> usize {
        self.calls.lock().get(&call).copied().unwrap_or(0)
    }

    /// Submissions accepted so far, oldest first
    pub fn submissions(&self) -> Vec<SyncSubmission> {
        self.submissions.lock().clone()
    }

    fn enter(&self, call: BackendCall, endpoint: &str) -> SyncResult<()> {
        *self.calls.lock().entry(call).or_insert(0) += 1;
        match self.failures.lock().get(&call) {
            Some(reason) => Err(SyncError::fetch(endpoint, reason)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SyncBackend for MemoryBackend {
    async fn fetch_sync_detail(&self, request: &DetailRequest) -> SyncResult<SyncDetail> {
        self.enter(BackendCall::SyncDetail, "sync detail")?;

        let gate = self.detail_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.registry
            .read()
            .details
            .get(&request.serial_number)
            .cloned()
            .ok_or_else(|| SyncError::Backend {
                code: "404".to_string(),
                message: "data not found".to_string(),
            })
    }

    async fn fetch_free_terminals(&self, project: &str) -> SyncResult<Vec<TargetTerminal>> {
        self.enter(BackendCall::FreeTerminals, "free terminals")?;
        Ok(self
            .registry
            .read()
            .free_terminals
            .get(project)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_device_catalog(&self, project: &str) -> SyncResult<Vec<DeviceDefinition>> {
        self.enter(BackendCall::DeviceCatalog, "device catalog")?;
        Ok(self
            .registry
            .read()
            .catalogs
            .get(project)
            .cloned()
            .unwrap_or_default())
    }

    async fn submit_reconciliation(&self, submission: &SyncSubmission) -> SyncResult<SubmitReceipt> {
        self.enter(BackendCall::Submit, "submit")?;
        self.submissions.lock().push(submission.clone());
        Ok(SubmitReceipt {
            status: common::WRITE_STATUS_OK.to_string(),
            message: Some("Sync terminal success".to_string()),
            device_count: submission.devices.len(),
        })
    }

    async fn list_pending_syncs(&self, project: &str) -> SyncResult<Vec<PendingSync>> {
        self.enter(BackendCall::PendingSyncs, "pending syncs")?;
        Ok(self
            .registry
            .read()
            .pending
            .get(project)
            .cloned()
            .unwrap_or_default())
    }
}
