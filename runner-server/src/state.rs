//! Shared application state for the render-runner server

use std::sync::Arc;

use chrono::{DateTime, Utc};
use runner_core::{
    CredentialStore, ImmediatePreparer, ManifestInfo, MemoryCredentialStore, PortPool,
    RenderConfig, SessionCoordinator, SessionTable, StreamRelay, WebSocketDialer, WorkerDialer,
};

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Session coordinator owning the port pool and session table
    pub coordinator: Arc<SessionCoordinator>,
    /// Relay bridging stream clients to workers
    pub relay: Arc<StreamRelay>,
    /// Per-domain caller credentials
    pub credentials: Arc<dyn CredentialStore>,
    /// Static service description
    pub manifest: ManifestInfo,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build the coordinator, relay and credential cache from configuration
    pub fn from_config(instance_id: impl Into<String>, render: &RenderConfig) -> Self {
        let coordinator = SessionCoordinator::spawn(
            render.coordinator_config(instance_id),
            Arc::new(PortPool::new(render.ports.iter().copied())),
            Arc::new(SessionTable::new()),
            Arc::new(ImmediatePreparer),
        );
        let dialer = Arc::new(WebSocketDialer::new(
            render.worker_host.clone(),
            render.worker_path.clone(),
        ));

        Self::with_components(coordinator, dialer, Arc::new(MemoryCredentialStore::new()))
    }

    /// Create AppState with custom components (for testing)
    pub fn with_components(
        coordinator: Arc<SessionCoordinator>,
        dialer: Arc<dyn WorkerDialer>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let relay = Arc::new(StreamRelay::new(Arc::clone(&coordinator), dialer));
        Self {
            coordinator,
            relay,
            credentials,
            manifest: ManifestInfo::render(),
            started_at: Utc::now(),
        }
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_from_config() {
        let render = RenderConfig {
            ports: vec![9201, 9202, 9202],
            fan_out: 2,
            ..RenderConfig::default()
        };
        let state = AppState::from_config("render-a", &render);

        assert!(state.uptime_seconds() >= 0);
        assert_eq!(state.coordinator.server_id(), "render-a");
        assert_eq!(state.coordinator.pool().capacity(), 2);
        assert_eq!(state.coordinator.config().fan_out, 2);
        assert_eq!(state.manifest.name, runner_core::manifest::SERVICE_NAME);
    }
}
