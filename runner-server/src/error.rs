//! Server error types

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use runner_core::{RelayError, RunnerError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the render-runner server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Request could not be understood
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Coordination failure
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ServerError {
    /// HTTP status and machine-readable code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Bind { .. } | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ServerError::Runner(e) => match e {
                RunnerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                RunnerError::AlreadyAttached(_) => (StatusCode::NOT_FOUND, "ALREADY_ATTACHED"),
                RunnerError::ForeignInstance { .. } => (StatusCode::NOT_FOUND, "FOREIGN_INSTANCE"),
                RunnerError::PortExhausted { .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, "PORT_EXHAUSTED")
                }
                RunnerError::InitializerClosed => {
                    (StatusCode::SERVICE_UNAVAILABLE, "INITIALIZER_CLOSED")
                }
                RunnerError::PrepareTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "PREPARE_TIMEOUT"),
                RunnerError::StartupTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "STARTUP_TIMEOUT"),
                RunnerError::PrepareFailed { .. } => (StatusCode::BAD_GATEWAY, "PREPARE_FAILED"),
                RunnerError::CredentialMissing(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                RunnerError::Relay(RelayError::InvalidOpen(_) | RelayError::ClosedBeforeOpen) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST")
                }
                RunnerError::Relay(_) => (StatusCode::BAD_GATEWAY, "WORKER_UNREACHABLE"),
            },
        }
    }
}

impl From<RelayError> for ServerError {
    fn from(e: RelayError) -> Self {
        ServerError::Runner(RunnerError::Relay(e))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::warn!(code, error = %self, "Request failed");
        } else {
            tracing::debug!(code, error = %self, "Request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}
