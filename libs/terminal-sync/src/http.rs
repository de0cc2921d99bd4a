//! Registry REST client

use async_trait::async_trait;
use common::{BackendConfig, BackendEnvelope};
use errors::{SyncError, SyncResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::assembler::SyncSubmission;
use crate::backend::{DetailRequest, SubmitReceipt, SyncBackend};
use crate::inbox::PendingSync;
use crate::types::{DeviceDefinition, SyncDetail, TargetTerminal};

/// [`SyncBackend`] over the registry HTTP API
///
/// The configured credential is attached to every request. Calls are not
/// retried; a failure is returned to the caller as is.
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> SyncResult<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        if let Some(token) = config.auth_token.as_deref().filter(|t| !t.trim().is_empty()) {
            let value = if token.contains(' ') {
                token.to_string()
            } else {
                format!("Bearer {}", token)
            };
            let mut value = HeaderValue::from_str(&value).map_err(|e| SyncError::InvalidConfig {
                field: "auth_token".to_string(),
                reason: e.to_string(),
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn send(&self, route: &str, request: RequestBuilder) -> SyncResult<BackendEnvelope> {
        debug!("Calling {}", route);
        let response = request.send().await.map_err(|e| {
            warn!("{} unreachable: {}", route, e);
            SyncError::fetch(route, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} answered {}", route, status);
            return Err(SyncError::fetch(route, format!("HTTP {}", status)));
        }

        response
            .json::<BackendEnvelope>()
            .await
            .map_err(|e| SyncError::UnexpectedPayload {
                endpoint: route.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl SyncBackend for HttpBackend {
    #[allow(clippy::disallowed_methods)] // json! macro internally uses unwrap (safe for known valid JSON)
    async fn fetch_sync_detail(&self, request: &DetailRequest) -> SyncResult<SyncDetail> {
        let route = &self.config.routes.sync_detail;
        let project = self.config.project_or_default(request.project.as_deref());
        let body = json!({
            "serialNumber": request.serial_number,
            "project": project,
            "syncId": request.sync_id,
        });

        let envelope = self
            .send(route, self.client.post(self.config.endpoint(route)).json(&body))
            .await?;
        envelope.into_payload(route)
    }

    async fn fetch_free_terminals(&self, project: &str) -> SyncResult<Vec<TargetTerminal>> {
        let route = &self.config.routes.free_terminals;
        let envelope = self
            .send(
                route,
                self.client
                    .get(self.config.endpoint(route))
                    .query(&[("project", project)]),
            )
            .await?;
        envelope.into_list(route)
    }

    #[allow(clippy::disallowed_methods)] // json! macro internally uses unwrap (safe for known valid JSON)
    async fn fetch_device_catalog(&self, project: &str) -> SyncResult<Vec<DeviceDefinition>> {
        let route = &self.config.routes.device_catalog;
        let envelope = self
            .send(
                route,
                self.client
                    .post(self.config.endpoint(route))
                    .json(&json!({ "project": project })),
            )
            .await?;
        envelope.into_list(route)
    }

    async fn submit_reconciliation(&self, submission: &SyncSubmission) -> SyncResult<SubmitReceipt> {
        let route = &self.config.routes.submit;
        info!(
            "Submitting {} device(s) for terminal {}",
            submission.devices.len(),
            submission.terminal_name
        );

        let envelope = self
            .send(route, self.client.post(self.config.endpoint(route)).json(submission))
            .await?;
        let status = envelope.into_write_status(route)?;

        Ok(SubmitReceipt {
            status: status.status,
            message: status.msg,
            device_count: submission.devices.len(),
        })
    }

    async fn list_pending_syncs(&self, project: &str) -> SyncResult<Vec<PendingSync>> {
        let route = &self.config.routes.pending_syncs;
        let envelope = self
            .send(
                route,
                self.client
                    .get(self.config.endpoint(route))
                    .query(&[("project", project)]),
            )
            .await?;
        envelope.into_list(route)
    }
}
