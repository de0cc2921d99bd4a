//! Runtime context shared by every command

use std::path::Path;
use std::sync::Arc;

use common::{get_string_config, load_backend_config, BackendConfig};
use errors::SyncResult;
use terminal_sync::{DetailLoader, HttpBackend};
use tracing::debug;

/// Environment variable overriding the project for one invocation
pub const ENV_PROJECT: &str = "SYNCCTL_PROJECT";

pub struct SyncContext {
    pub config: BackendConfig,
    /// Project every command works in
    pub project: String,
    pub loader: DetailLoader<HttpBackend>,
}

impl SyncContext {
    pub fn new(config_file: Option<&Path>, project: Option<String>) -> SyncResult<Self> {
        let config = load_backend_config(config_file)?;
        let project = get_string_config(project, ENV_PROJECT, config.default_project.clone());
        debug!("Working in project {} against {}", project, config.base_url);

        let backend = Arc::new(HttpBackend::new(config.clone())?);
        let loader = DetailLoader::new(backend, config.default_project.clone());

        Ok(Self {
            config,
            project,
            loader,
        })
    }
}
