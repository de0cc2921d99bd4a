//! Detail loader
//!
//! Reads everything a reconciliation needs from the backend: the incoming
//! record with its resolved terminal, the device catalog (cached per project
//! across sessions), free terminal candidates and the pending-sync inbox.
//! Reads are idempotent and never retried here.

use std::collections::HashMap;
use std::sync::Arc;

use errors::SyncResult;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::backend::{DetailRequest, SyncBackend};
use crate::inbox::SyncInbox;
use crate::types::{DeviceDefinition, SyncDetail, TargetTerminal};

/// Device catalogs by project, shared across sessions
#[derive(Debug, Default)]
pub struct CatalogCache {
    entries: RwLock<HashMap<String, Arc<Vec<DeviceDefinition>>>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, project: &str) -> Option<Arc<Vec<DeviceDefinition>>> {
        self.entries.read().get(project).cloned()
    }

    pub fn insert(&self, project: impl Into<String>, catalog: Arc<Vec<DeviceDefinition>>) {
        self.entries.write().insert(project.into(), catalog);
    }

    pub fn invalidate(&self, project: &str) -> bool {
        self.entries.write().remove(project).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

pub struct DetailLoader<B: SyncBackend> {
    backend: Arc<B>,
    cache: Arc<CatalogCache>,
    default_project: String,
}

impl<B: SyncBackend> Clone for DetailLoader<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            cache: Arc::clone(&self.cache),
            default_project: self.default_project.clone(),
        }
    }
}

impl<B: SyncBackend> DetailLoader<B> {
    pub fn new(backend: Arc<B>, default_project: impl Into<String>) -> Self {
        Self {
            backend,
            cache: Arc::new(CatalogCache::new()),
            default_project: default_project.into(),
        }
    }

    /// Share an existing catalog cache
    pub fn with_cache(mut self, cache: Arc<CatalogCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }

    pub fn default_project(&self) -> &str {
        &self.default_project
    }

    /// Project code of a request, falling back to the default tenant
    pub fn resolve_project(&self, project: Option<&str>) -> String {
        match project.map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => self.default_project.clone(),
        }
    }

    /// Incoming record and resolved terminal in one call
    pub async fn load_detail(&self, request: &DetailRequest) -> SyncResult<SyncDetail> {
        let mut request = request.clone();
        request.project = Some(self.resolve_project(request.project.as_deref()));

        debug!(
            "Loading sync detail for {} ({})",
            request.serial_number,
            request.project.as_deref().unwrap_or_default()
        );
        match self.backend.fetch_sync_detail(&request).await {
            Ok(detail) => {
                debug!(
                    "Loaded {} item(s), terminal {}",
                    detail.sync_terminal.items.len(),
                    detail
                        .terminal
                        .as_ref()
                        .map(TargetTerminal::label)
                        .unwrap_or_else(|| "unresolved".to_string())
                );
                Ok(detail)
            },
            Err(e) => {
                warn!("Sync detail for {} failed: {}", request.serial_number, e);
                Err(e)
            },
        }
    }

    /// Device catalog, served from the cache when present
    ///
    /// Empty answers are not cached so a later session asks again.
    pub async fn load_catalog(&self, project: &str) -> SyncResult<Arc<Vec<DeviceDefinition>>> {
        if let Some(catalog) = self.cache.get(project) {
            debug!("Catalog for {} served from cache", project);
            return Ok(catalog);
        }

        let catalog = match self.backend.fetch_device_catalog(project).await {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                warn!("Device catalog for {} failed: {}", project, e);
                return Err(e);
            },
        };
        debug!("Loaded {} device definition(s) for {}", catalog.len(), project);
        if !catalog.is_empty() {
            self.cache.insert(project, Arc::clone(&catalog));
        }
        Ok(catalog)
    }

    pub async fn load_free_terminals(&self, project: &str) -> SyncResult<Vec<TargetTerminal>> {
        self.backend
            .fetch_free_terminals(project)
            .await
            .inspect(|terminals| debug!("{} free terminal(s) in {}", terminals.len(), project))
            .inspect_err(|e| warn!("Free terminals for {} failed: {}", project, e))
    }

    pub async fn load_inbox(&self, project: &str) -> SyncResult<SyncInbox> {
        let rows = self
            .backend
            .list_pending_syncs(project)
            .await
            .inspect_err(|e| warn!("Pending syncs for {} failed: {}", project, e))?;
        Ok(SyncInbox::new(rows))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::memory_impl::{BackendCall, MemoryBackend};

    fn definition(code: &str) -> DeviceDefinition {
        DeviceDefinition {
            device_code: code.into(),
            device_type_code: "RP".into(),
            device_type_name: "READER PREPAID".into(),
            project: Some("KCI".into()),
            sequence_number: "01".into(),
        }
    }

    #[tokio::test]
    async fn test_catalog_cached_across_loaders() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_catalog("KCI", vec![definition("reader_prepaid")]);
        let cache = Arc::new(CatalogCache::new());

        let first = DetailLoader::new(backend.clone(), "KCI").with_cache(cache.clone());
        let second = DetailLoader::new(backend.clone(), "KCI").with_cache(cache.clone());
        first.load_catalog("KCI").await.unwrap();
        let catalog = second.load_catalog("KCI").await.unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(backend.calls(BackendCall::DeviceCatalog), 1);

        assert!(cache.invalidate("KCI"));
        second.load_catalog("KCI").await.unwrap();
        assert_eq!(backend.calls(BackendCall::DeviceCatalog), 2);
    }

    #[tokio::test]
    async fn test_failed_catalog_not_cached() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_catalog("KCI", vec![definition("reader_prepaid")]);
        backend.fail(BackendCall::DeviceCatalog, "connection reset");
        let loader = DetailLoader::new(backend.clone(), "KCI");

        assert!(loader.load_catalog("KCI").await.is_err());
        assert!(loader.cache().is_empty());

        backend.recover(BackendCall::DeviceCatalog);
        assert_eq!(loader.load_catalog("KCI").await.unwrap().len(), 1);
    }

    #[test]
    fn test_project_fallback() {
        let loader = DetailLoader::new(Arc::new(MemoryBackend::new()), "KCI");
        assert_eq!(loader.resolve_project(None), "KCI");
        assert_eq!(loader.resolve_project(Some(" ")), "KCI");
        assert_eq!(loader.resolve_project(Some("MRT")), "MRT");
    }
}
