use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    availability::AvailabilityMonitor,
    backend::BackendClient,
    config::ClientConfig,
    intake::PreviewStore,
    web::workspace::WorkspaceRegistry,
};

#[derive(Clone)]
pub struct AppState {
    config: Arc<ClientConfig>,
    backend: BackendClient,
    monitor: Arc<AvailabilityMonitor<BackendClient>>,
    previews: PreviewStore,
    workspaces: WorkspaceRegistry,
}

impl AppState {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let backend = BackendClient::new(config.backend_base_url.clone())
            .context("failed to initialize backend client")?;
        let monitor = AvailabilityMonitor::new(backend.clone(), config.monitor);
        info!(backend = %backend.base_url(), "receipt backend configured");

        Ok(Self {
            config: Arc::new(config),
            backend,
            monitor: Arc::new(monitor),
            previews: PreviewStore::new(),
            workspaces: WorkspaceRegistry::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    pub fn monitor(&self) -> &AvailabilityMonitor<BackendClient> {
        &self.monitor
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    pub fn workspaces(&self) -> &WorkspaceRegistry {
        &self.workspaces
    }
}
