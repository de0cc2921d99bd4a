//! Terminal sync reconciliation engine
//!
//! Reconciles the hardware a scanned terminal reports against the device
//! registry:
//!
//! - [`DetailLoader`] reads the incoming record, the resolved terminal, free
//!   terminals and the device catalog through a [`SyncBackend`]
//! - [`auto_match`] proposes a catalog definition per incoming sub-item
//! - [`ReconciliationState`] holds mapping decisions and the restore set and
//!   classifies every row for review
//! - [`assemble`] builds the [`SyncSubmission`] once every item is mapped
//! - [`SyncSession`] ties them together with the session state machine
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use terminal_sync::{DetailLoader, DetailRequest, HttpBackend, SyncSession};
//!
//! # async fn run() -> errors::SyncResult<()> {
//! let config = common::load_backend_config(None)?;
//! let default_project = config.default_project.clone();
//! let loader = DetailLoader::new(Arc::new(HttpBackend::new(config)?), default_project);
//!
//! let mut session = SyncSession::open(loader, DetailRequest::new("072-1293")).await;
//! if let Some(review) = session.review() {
//!     println!("{} unmapped", review.counts.unmapped);
//! }
//! session.submit().await?;
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod backend;
pub mod decision;
pub mod http;
pub mod inbox;
pub mod key;
pub mod loader;
pub mod matcher;
pub mod memory_impl;
pub mod session;
pub mod state;
pub mod types;

pub use assembler::{assemble, DevicePayloadEntry, SyncSubmission, DEFAULT_MODEL_CODE};
pub use backend::{DetailRequest, SubmitReceipt, SyncBackend};
pub use decision::{generated_device_name, MappingDecision};
pub use http::HttpBackend;
pub use inbox::{MatchStatus, PendingSync, SignatureStatus, SyncInbox};
pub use key::MappingKey;
pub use loader::{CatalogCache, DetailLoader};
pub use matcher::{auto_match, find_definition, match_registered};
pub use memory_impl::{BackendCall, MemoryBackend};
pub use session::{Liveness, SessionPhase, SyncSession};
pub use state::{
    ExistingRow, ExistingStatus, IncomingRow, ItemStatus, ReconciliationState, ReviewReport,
    StatusCounts, TerminalSummary,
};
pub use types::{
    parse_sub_items, DeviceDefinition, Direction, ExistingDevice, IncomingRecord, IncomingSubItem,
    SyncDetail, TargetTerminal,
};
