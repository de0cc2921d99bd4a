//! Configuration loading for the registry backend client
//!
//! Values are layered with figment, lowest priority first:
//! serde defaults, `config/default.*`, `config/{env}.*`, an explicit file,
//! then `SYNCCTL_`-prefixed environment variables.

use std::path::Path;

use errors::{SyncError, SyncResult};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable prefix for every setting
pub const ENV_PREFIX: &str = "SYNCCTL_";
/// Environment variable selecting the environment-specific config file
pub const ENV_PROFILE: &str = "SYNCCTL_ENV";
/// Default tenant when a request carries no project code
pub const DEFAULT_PROJECT: &str = "KCI";
/// Default backend base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Endpoint paths relative to `base_url`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendRoutes {
    /// Incoming sync record plus resolved terminal
    pub sync_detail: String,
    /// Unassigned terminals for a project
    pub free_terminals: String,
    /// Device-definition catalog
    pub device_catalog: String,
    /// Persist a reconciled terminal
    pub submit: String,
    /// Incoming sync records awaiting review
    pub pending_syncs: String,
}

impl Default for BackendRoutes {
    fn default() -> Self {
        Self {
            sync_detail: "terminal/get-data-mapping-terminal-sync".to_string(),
            free_terminals: "terminal/get-free-terminal".to_string(),
            device_catalog: "device/device-type".to_string(),
            submit: "terminal/sync-terminal".to_string(),
            pending_syncs: "terminal/list-sync-terminal".to_string(),
        }
    }
}

/// Registry backend client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the registry API
    pub base_url: String,
    /// Static credential sent as the `Authorization` header
    pub auth_token: Option<String>,
    /// Tenant used when a request has no project code
    pub default_project: String,
    /// Value of the `User-Agent` header
    pub user_agent: String,
    /// Endpoint paths
    pub routes: BackendRoutes,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_token: None,
            default_project: DEFAULT_PROJECT.to_string(),
            user_agent: format!("terminal-sync/{}", env!("CARGO_PKG_VERSION")),
            routes: BackendRoutes::default(),
        }
    }
}

impl BackendConfig {
    /// Join a route onto the base URL
    pub fn endpoint(&self, route: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            route.trim_start_matches('/')
        )
    }

    /// Resolve an optional project code against the configured default
    pub fn project_or_default(&self, project: Option<&str>) -> String {
        match project.map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => self.default_project.clone(),
        }
    }

    /// Reject settings the client cannot work with
    pub fn validate(&self) -> SyncResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(SyncError::InvalidConfig {
                field: "base_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if let Err(e) = reqwest::Url::parse(&self.base_url) {
            return Err(SyncError::InvalidConfig {
                field: "base_url".to_string(),
                reason: e.to_string(),
            });
        }
        if self.default_project.trim().is_empty() {
            return Err(SyncError::InvalidConfig {
                field: "default_project".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        let routes = [
            ("routes.sync_detail", &self.routes.sync_detail),
            ("routes.free_terminals", &self.routes.free_terminals),
            ("routes.device_catalog", &self.routes.device_catalog),
            ("routes.submit", &self.routes.submit),
            ("routes.pending_syncs", &self.routes.pending_syncs),
        ];
        for (field, route) in routes {
            if route.trim().is_empty() {
                return Err(SyncError::InvalidConfig {
                    field: field.to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Build the layered figment for `T`
fn layered<T>(explicit_file: Option<&Path>) -> SyncResult<Figment>
where
    T: Serialize + Default,
{
    let env = std::env::var(ENV_PROFILE).unwrap_or_else(|_| "development".to_string());

    let mut figment = Figment::from(Serialized::defaults(T::default()))
        .merge(Toml::file("config/default.toml"))
        .merge(Yaml::file("config/default.yaml"))
        .merge(Json::file("config/default.json"))
        .merge(Toml::file(format!("config/{}.toml", env)))
        .merge(Yaml::file(format!("config/{}.yaml", env)))
        .merge(Json::file(format!("config/{}.json", env)));

    if let Some(path) = explicit_file {
        figment = figment.merge(file_provider(path)?);
    }

    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Pick a provider by file extension
fn file_provider(path: &Path) -> SyncResult<Figment> {
    if !path.exists() {
        return Err(SyncError::Configuration(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| SyncError::Configuration("Config file must have an extension".to_string()))?;

    match extension {
        "toml" => Ok(Figment::new().merge(Toml::file(path))),
        "yaml" | "yml" => Ok(Figment::new().merge(Yaml::file(path))),
        "json" => Ok(Figment::new().merge(Json::file(path))),
        _ => Err(SyncError::Configuration(format!(
            "Unsupported config file format: {}",
            extension
        ))),
    }
}

/// Load configuration from defaults, config files and environment
pub fn load_config<T>(explicit_file: Option<&Path>) -> SyncResult<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Default,
{
    let figment = layered::<T>(explicit_file)?;
    if let Some(path) = explicit_file {
        info!("Loading configuration from {}", path.display());
    }
    figment
        .extract()
        .map_err(|e| SyncError::Configuration(format!("Failed to load configuration: {}", e)))
}

/// Load and validate the backend client configuration
pub fn load_backend_config(explicit_file: Option<&Path>) -> SyncResult<BackendConfig> {
    let config: BackendConfig = load_config(explicit_file)?;
    config.validate()?;
    debug!(
        "Backend configured at {} (default project {})",
        config.base_url, config.default_project
    );
    Ok(config)
}

/// Get string configuration value with priority: explicit > ENV > Default
pub fn get_string_config(explicit: Option<String>, env_var: &str, default: String) -> String {
    if let Some(val) = explicit {
        if !val.is_empty() {
            info!("Using {} from command line", env_var);
            return val;
        }
    }

    match std::env::var(env_var) {
        Ok(env_val) if !env_val.is_empty() => {
            info!("Using {} from environment", env_var);
            return env_val;
        },
        Ok(_) => warn!("Ignoring empty {} from environment", env_var),
        Err(_) => {},
    }

    debug!("Using default value for {}", env_var);
    default
}
