//! Reconciliation session
//!
//! Drives one reconciliation from load to submission:
//!
//! ```text
//! Loading -> ReadyLocked | ReadyUnlocked -> Submitting -> Closed
//!    |                ^                         |
//!    v                +------ (submit error) ---+
//! Unavailable
//! ```
//!
//! Every backend answer is checked against the session [`Liveness`] before
//! it touches state, so a response that arrives after [`SyncSession::close`]
//! is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use errors::{ErrorInfo, SyncError, SyncResult};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::assembler::{assemble, SyncSubmission};
use crate::backend::{DetailRequest, SubmitReceipt, SyncBackend};
use crate::loader::DetailLoader;
use crate::state::{ReconciliationState, ReviewReport};
use crate::types::{DeviceDefinition, SyncDetail, TargetTerminal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Loading,
    /// Backend resolved the terminal; target changes are ignored
    ReadyLocked,
    /// Operator picks the target terminal
    ReadyUnlocked,
    Submitting,
    Closed,
    /// Load failed; nothing to show until a refresh succeeds
    Unavailable,
}

impl SessionPhase {
    pub fn is_ready(self) -> bool {
        matches!(self, SessionPhase::ReadyLocked | SessionPhase::ReadyUnlocked)
    }
}

/// Shared flag telling in-flight work whether the session is still open
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SyncSession<B: SyncBackend> {
    loader: DetailLoader<B>,
    request: DetailRequest,
    project: String,
    phase: SessionPhase,
    state: Option<ReconciliationState>,
    catalog: Option<Arc<Vec<DeviceDefinition>>>,
    free_terminals: Option<Vec<TargetTerminal>>,
    liveness: Liveness,
    last_error: Option<ErrorInfo>,
    receipt: Option<SubmitReceipt>,
}

impl<B: SyncBackend> SyncSession<B> {
    /// Session in `Loading`; call [`SyncSession::load`] to populate it
    pub fn new(loader: DetailLoader<B>, request: DetailRequest) -> Self {
        let project = loader.resolve_project(request.project.as_deref());
        Self {
            loader,
            request,
            project,
            phase: SessionPhase::Loading,
            state: None,
            catalog: None,
            free_terminals: None,
            liveness: Liveness::new(),
            last_error: None,
            receipt: None,
        }
    }

    /// Create and load a session; a failed load leaves it `Unavailable`
    pub async fn open(loader: DetailLoader<B>, request: DetailRequest) -> Self {
        let mut session = Self::new(loader, request);
        if let Err(e) = session.load().await {
            debug!("Session opened without data: {}", e);
        }
        session
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn request(&self) -> &DetailRequest {
        &self.request
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn state(&self) -> Option<&ReconciliationState> {
        self.state.as_ref()
    }

    pub fn catalog(&self) -> &[DeviceDefinition] {
        self.catalog.as_deref().map(Vec::as_slice).unwrap_or_default()
    }

    /// Catalog entry by device code
    pub fn definition(&self, device_code: &str) -> Option<&DeviceDefinition> {
        self.catalog().iter().find(|d| d.device_code == device_code)
    }

    /// Notification for the most recent failure, cleared by the next success
    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    pub fn receipt(&self) -> Option<&SubmitReceipt> {
        self.receipt.as_ref()
    }

    pub fn review(&self) -> Option<ReviewReport> {
        self.state.as_ref().map(ReconciliationState::review)
    }

    fn ensure_alive(&mut self) -> SyncResult<()> {
        if self.liveness.is_alive() {
            Ok(())
        } else {
            self.phase = SessionPhase::Closed;
            self.state = None;
            Err(SyncError::SessionClosed)
        }
    }

    fn record_error(&mut self, error: &SyncError) {
        self.last_error = Some(error.to_error_info());
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Fetch detail and catalog and rebuild the state from scratch
    ///
    /// Safe to call again from any phase except `Submitting` and `Closed`;
    /// operator edits are discarded.
    pub async fn load(&mut self) -> SyncResult<()> {
        match self.phase {
            SessionPhase::Closed => return Err(SyncError::SessionClosed),
            SessionPhase::Submitting => {
                return Err(SyncError::SessionBusy("submission in progress".to_string()))
            },
            _ => {},
        }
        self.phase = SessionPhase::Loading;
        self.state = None;
        self.free_terminals = None;

        let (detail, catalog) = tokio::join!(
            self.loader.load_detail(&self.request),
            self.loader.load_catalog(&self.project)
        );
        self.ensure_alive()?;

        match detail {
            Ok(detail) => self.apply_detail(detail),
            Err(e) => {
                self.record_error(&e);
                self.phase = SessionPhase::Unavailable;
                return Err(e);
            },
        }

        match catalog {
            Ok(catalog) => self.apply_catalog(catalog),
            // The session stays usable; items remain unmapped until the
            // catalog is reloaded or mapped by hand
            Err(e) => self.record_error(&e),
        }

        Ok(())
    }

    /// Re-fetch everything; alias of [`SyncSession::load`]
    pub async fn refresh(&mut self) -> SyncResult<()> {
        self.load().await
    }

    fn apply_detail(&mut self, detail: SyncDetail) {
        let state = ReconciliationState::new(detail.sync_terminal, detail.terminal);
        self.phase = if state.is_locked() {
            SessionPhase::ReadyLocked
        } else {
            SessionPhase::ReadyUnlocked
        };
        info!(
            "Session for {} ready ({:?}, {} item(s))",
            self.request.serial_number,
            self.phase,
            state.items().len()
        );
        self.state = Some(state);
        self.last_error = None;
    }

    /// Install a catalog and merge fresh auto-match proposals
    ///
    /// Decisions already present are left as they are, so this can run any
    /// number of times.
    pub fn apply_catalog(&mut self, catalog: Arc<Vec<DeviceDefinition>>) {
        self.catalog = Some(catalog);
        self.rematch();
    }

    fn rematch(&mut self) {
        let catalog = self.catalog.as_deref().map(Vec::as_slice).unwrap_or_default();
        if let Some(state) = self.state.as_mut() {
            let added = state.propose_mappings(catalog);
            debug!("Auto-match added {} decision(s)", added);
        }
    }

    /// Fetch the catalog again and re-run the matcher
    pub async fn reload_catalog(&mut self) -> SyncResult<()> {
        let catalog = self.loader.load_catalog(&self.project).await;
        self.ensure_alive()?;
        match catalog {
            Ok(catalog) => {
                self.apply_catalog(catalog);
                Ok(())
            },
            Err(e) => {
                self.record_error(&e);
                Err(e)
            },
        }
    }

    // ========================================================================
    // Operator edits
    // ========================================================================

    /// Mutable state, available only while the session is ready
    pub fn state_mut(&mut self) -> SyncResult<&mut ReconciliationState> {
        match self.phase {
            SessionPhase::ReadyLocked | SessionPhase::ReadyUnlocked => {},
            SessionPhase::Closed => return Err(SyncError::SessionClosed),
            SessionPhase::Submitting => {
                return Err(SyncError::SessionBusy("submission in progress".to_string()))
            },
            SessionPhase::Loading | SessionPhase::Unavailable => {
                return Err(SyncError::not_found("sync detail"))
            },
        }
        self.state
            .as_mut()
            .ok_or_else(|| SyncError::not_found("sync detail"))
    }

    /// Free terminals the operator may target
    ///
    /// Fetched on first use and only for unlocked sessions; a locked session
    /// returns an empty list without a network call.
    pub async fn candidate_terminals(&mut self) -> SyncResult<&[TargetTerminal]> {
        if self.phase == SessionPhase::ReadyLocked {
            return Ok(&[]);
        }
        if self.phase != SessionPhase::ReadyUnlocked {
            self.state_mut()?;
        }

        if self.free_terminals.is_none() {
            let fetched = self.loader.load_free_terminals(&self.project).await;
            self.ensure_alive()?;
            match fetched {
                Ok(terminals) => self.free_terminals = Some(terminals),
                Err(e) => {
                    self.record_error(&e);
                    return Err(e);
                },
            }
        }
        Ok(self.free_terminals.as_deref().unwrap_or_default())
    }

    /// Target a free terminal by id
    pub async fn select_target(&mut self, terminal_id: &str) -> SyncResult<()> {
        let locked_to = self
            .state
            .as_ref()
            .filter(|s| s.is_locked())
            .and_then(|s| s.target())
            .map(TargetTerminal::label);
        if let Some(terminal) = locked_to {
            warn!("Target change to {} refused, session locked", terminal_id);
            return Err(SyncError::TargetLocked { terminal });
        }

        let terminal = self
            .candidate_terminals()
            .await?
            .iter()
            .find(|t| t.id == terminal_id)
            .cloned()
            .ok_or_else(|| SyncError::not_found(format!("free terminal {}", terminal_id)))?;

        if self.state_mut()?.set_target_terminal(terminal) {
            self.rematch();
        }
        Ok(())
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Build the submission for the current state without sending it
    pub fn assemble(&self) -> SyncResult<SyncSubmission> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| SyncError::not_found("sync detail"))?;
        assemble(state, self.loader.default_project())
    }

    /// Validate, then hand the payload to the backend
    ///
    /// Validation failures return before any network call and leave the
    /// phase unchanged. A backend failure returns to the previous ready
    /// phase with every edit intact; success closes the session.
    pub async fn submit(&mut self) -> SyncResult<SubmitReceipt> {
        let previous = self.phase;
        self.state_mut()?;

        let submission = match self.assemble() {
            Ok(submission) => submission,
            Err(e) => {
                self.record_error(&e);
                return Err(e);
            },
        };

        self.phase = SessionPhase::Submitting;
        let result = self
            .loader
            .backend()
            .submit_reconciliation(&submission)
            .await;
        self.ensure_alive()?;

        match result {
            Ok(receipt) => {
                info!(
                    "Terminal {} synced with {} device(s)",
                    submission.terminal_name, receipt.device_count
                );
                self.receipt = Some(receipt.clone());
                self.last_error = None;
                self.close();
                Ok(receipt)
            },
            Err(e) => {
                warn!("Submission for {} failed: {}", submission.terminal_name, e);
                self.record_error(&e);
                self.phase = previous;
                Err(e)
            },
        }
    }

    /// Discard the session; later backend responses are ignored
    pub fn close(&mut self) {
        self.liveness.close();
        self.phase = SessionPhase::Closed;
        self.state = None;
        self.free_terminals = None;
    }
}
