//! Render service handlers: credentials, start and stop

use std::sync::Arc;

use axum::{
    Json,
    extract::{RawQuery, State},
    http::StatusCode,
};
use runner_core::{RunnerError, SessionRef, StartResponse, TokenModel, WorkRequest};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppState, ServerError};

/// Acknowledgement for credential operations
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub domain: String,
    pub status: String,
}

impl TokenResponse {
    fn new(domain: String, status: &str) -> Self {
        Self {
            domain,
            status: status.to_string(),
        }
    }
}

fn validate_token(token: &TokenModel) -> Result<(), ServerError> {
    if token.domain.trim().is_empty() {
        return Err(ServerError::BadRequest("domain is required".into()));
    }
    if token.access_token.is_empty() {
        return Err(ServerError::BadRequest("access_token is required".into()));
    }
    Ok(())
}

/// POST /api/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(token): Json<TokenModel>,
) -> Result<Json<TokenResponse>, ServerError> {
    validate_token(&token)?;
    let key = state.manifest.credential_key(&token.domain);
    let domain = token.domain.clone();
    state.credentials.put(&key, token).await;
    info!(service = %state.manifest.name, domain = %domain, "Credential registered");
    Ok(Json(TokenResponse::new(domain, "registered")))
}

/// POST /api/update
pub async fn update(
    State(state): State<Arc<AppState>>,
    Json(token): Json<TokenModel>,
) -> Result<Json<TokenResponse>, ServerError> {
    validate_token(&token)?;
    let key = state.manifest.credential_key(&token.domain);
    let domain = token.domain.clone();
    state.credentials.put(&key, token).await;
    info!(service = %state.manifest.name, domain = %domain, "Credential updated");
    Ok(Json(TokenResponse::new(domain, "updated")))
}

/// POST /api/unregister
pub async fn unregister(
    State(state): State<Arc<AppState>>,
    Json(token): Json<TokenModel>,
) -> Result<Json<TokenResponse>, ServerError> {
    if token.domain.trim().is_empty() {
        return Err(ServerError::BadRequest("domain is required".into()));
    }
    let key = state.manifest.credential_key(&token.domain);
    let removed = state.credentials.remove(&key).await;
    info!(service = %state.manifest.name, domain = %token.domain, removed, "Credential unregistered");
    let status = if removed { "unregistered" } else { "absent" };
    Ok(Json(TokenResponse::new(token.domain, status)))
}

/// Body of `POST /api/start`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    #[serde(alias = "workItemID", alias = "workItemId")]
    pub work_item_id: String,
    pub domain: String,
    /// Prefix of the returned stream and stop URLs
    #[serde(alias = "baseWSlink", alias = "baseWsLink")]
    pub base_ws_link: String,
}

/// POST /api/start
pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, ServerError> {
    if request.work_item_id.trim().is_empty() {
        return Err(ServerError::BadRequest("work_item_id is required".into()));
    }

    let key = state.manifest.credential_key(&request.domain);
    let credential = state
        .credentials
        .get(&key)
        .await
        .ok_or_else(|| RunnerError::CredentialMissing(request.domain.clone()))?;

    let response = state
        .coordinator
        .start(
            WorkRequest::new(request.work_item_id, request.base_ws_link),
            Some(credential),
        )
        .await?;
    Ok(Json(response))
}

/// Body of `POST /api/stop`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRequest {
    pub session_id: String,
}

/// POST /api/stop
pub async fn stop(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StopRequest>,
) -> Result<StatusCode, ServerError> {
    state.coordinator.stop(&request.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET|POST /Services.Stop?_id=..&_sid=..
pub async fn stop_by_query(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<StatusCode, ServerError> {
    let sref = SessionRef::from_query(query.as_deref().unwrap_or_default())?;
    state.coordinator.stop_ref(&sref).await?;
    Ok(StatusCode::NO_CONTENT)
}
