//! Read-only REST handlers

use std::sync::Arc;

use axum::{Json, extract::State};
use runner_core::{ManifestInfo, SessionInfo};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the server
    pub status: String,
    /// Server version
    pub version: String,
    /// Id embedded in issued URLs
    pub instance_id: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
    /// Number of registered sessions
    pub active_sessions: usize,
    /// Ports available for new sessions
    pub free_ports: usize,
    /// Total ports in the pool
    pub total_ports: usize,
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let coordinator = &state.coordinator;

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        instance_id: coordinator.server_id().to_string(),
        uptime_seconds: state.uptime_seconds(),
        active_sessions: coordinator.session_count().await,
        free_ports: coordinator.pool().available(),
        total_ports: coordinator.pool().capacity(),
    })
}

/// GET /api/manifest
pub async fn manifest(State(state): State<Arc<AppState>>) -> Json<ManifestInfo> {
    Json(state.manifest.clone())
}

/// Response for listing sessions
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionListResponse> {
    let mut sessions = state.coordinator.sessions().await;
    sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Json(SessionListResponse { sessions })
}
