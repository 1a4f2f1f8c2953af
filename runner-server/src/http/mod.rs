//! HTTP server module

mod api;
mod services;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::AppState;
use crate::ws::stream_handler;

pub use api::{HealthResponse, SessionListResponse};
pub use services::{StartRequest, StopRequest, TokenResponse};

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/manifest", get(api::manifest))
        .route("/api/sessions", get(api::list_sessions))
        .route("/api/register", post(services::register))
        .route("/api/update", post(services::update))
        .route("/api/unregister", post(services::unregister))
        .route("/api/start", post(services::start))
        .route("/api/stop", post(services::stop))
        .route(
            "/Services.Stop",
            get(services::stop_by_query).post(services::stop_by_query),
        )
        .route("/Services.Stream", get(stream_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
