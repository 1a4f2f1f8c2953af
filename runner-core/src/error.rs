//! Error types for runner-core

use thiserror::Error;

/// Top-level error type for session coordination
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Port pool exhausted: requested {requested}, available {available}")]
    PortExhausted { requested: usize, available: usize },

    #[error("Workspace prepare timed out: work item {0}")]
    PrepareTimeout(String),

    #[error("Worker start up timed out: work item {0}")]
    StartupTimeout(String),

    #[error("Worker preparation failed for work item {work_item_id}: {reason}")]
    PrepareFailed {
        work_item_id: String,
        reason: String,
    },

    #[error("Initializer is not accepting work")]
    InitializerClosed,

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already attached: {0}")]
    AlreadyAttached(String),

    #[error("Session {session_id} was issued by instance {instance_id}")]
    ForeignInstance {
        session_id: String,
        instance_id: String,
    },

    #[error("No credential registered for {0}")]
    CredentialMissing(String),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
}

impl RunnerError {
    /// Whether the error means the referenced session cannot be used by the caller
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RunnerError::NotFound(_)
                | RunnerError::AlreadyAttached(_)
                | RunnerError::ForeignInstance { .. }
        )
    }

    /// Whether the error is a bounded wait that ran out
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            RunnerError::PrepareTimeout(_) | RunnerError::StartupTimeout(_)
        )
    }
}

/// Errors raised while relaying frames between a client and a worker
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to dial worker at {url}: {reason}")]
    Dial { url: String, reason: String },

    #[error("Gave up dialing worker on port {port}: {reason}")]
    DialAborted { port: u16, reason: &'static str },

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Invalid stream open: {0}")]
    InvalidOpen(String),

    #[error("Stream closed before the session was identified")]
    ClosedBeforeOpen,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_exhausted_displays_counts() {
        let error = RunnerError::PortExhausted {
            requested: 4,
            available: 1,
        };
        assert!(error.to_string().contains("requested 4"));
        assert!(error.to_string().contains("available 1"));
    }

    #[test]
    fn not_found_class_covers_attach_conflicts() {
        assert!(RunnerError::NotFound("a".to_string()).is_not_found());
        assert!(RunnerError::AlreadyAttached("a".to_string()).is_not_found());
        assert!(
            RunnerError::ForeignInstance {
                session_id: "a".to_string(),
                instance_id: "b".to_string(),
            }
            .is_not_found()
        );
        assert!(!RunnerError::InitializerClosed.is_not_found());
    }

    #[test]
    fn timeouts_are_classified() {
        assert!(RunnerError::PrepareTimeout("w".to_string()).is_timeout());
        assert!(RunnerError::StartupTimeout("w".to_string()).is_timeout());
        assert!(!RunnerError::NotFound("w".to_string()).is_timeout());
    }

    #[test]
    fn relay_error_converts_into_runner_error() {
        let error: RunnerError = RelayError::Read("connection reset".to_string()).into();
        assert!(matches!(error, RunnerError::Relay(RelayError::Read(_))));
        assert!(error.to_string().contains("connection reset"));
    }
}
