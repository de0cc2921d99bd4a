//! Shared foundation for the terminal sync workspace
//!
//! Provides the pieces every crate and tool needs:
//! - logging setup
//! - layered configuration for the registry backend client
//! - registry envelope types and lenient serde helpers
//! - interrupt handling for interactive tools

pub mod api_types;
pub mod config_loader;
pub mod logging;
pub mod serde_helpers;
pub mod shutdown;

pub use api_types::{BackendEnvelope, BackendFailure, WriteStatus, WRITE_STATUS_OK};
pub use config_loader::{
    get_string_config, load_backend_config, load_config, BackendConfig, BackendRoutes,
    DEFAULT_BASE_URL, DEFAULT_PROJECT, ENV_PREFIX,
};

// Re-export common dependencies
pub use anyhow;
pub use serde;
pub use serde_json;
pub use tokio;
