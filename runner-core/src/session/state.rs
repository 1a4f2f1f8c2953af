//! Session record and state machine
//!
//! A session is one provisioned worker slot. Its state is an explicit tag so
//! the reaper and the relay can match on it directly:
//!
//! ```text
//! Pending ──► Provisioned ──► Attaching ──► Connected ──► Closed
//!                  ▲               │  ▲                       │
//!                  └── dial failed ┘  └────── reconnect ──────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// State of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Registered, waiting for the batch readiness signal
    Pending,
    /// Port assigned and worker ready, no client attached
    Provisioned,
    /// A client stream is dialing the worker
    Attaching,
    /// A client stream is relaying frames to the worker
    Connected,
    /// The relay ended; the port stays owned until the session is stopped
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Pending => "pending",
            SessionState::Provisioned => "provisioned",
            SessionState::Attaching => "attaching",
            SessionState::Connected => "connected",
            SessionState::Closed => "closed",
        }
    }
}

/// A provisioned worker slot
#[derive(Debug)]
pub struct Session {
    id: String,
    batch_id: String,
    work_item_id: String,
    port: u16,
    base_uri: String,
    /// Lifetime of the session, a child of the batch token
    token: CancellationToken,
    /// Token of the relay bound to this session, if any
    connection: Option<CancellationToken>,
    state: SessionState,
    /// Last time the session became free for a client
    idle_since: Instant,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session in the `Pending` state
    pub fn new(
        id: impl Into<String>,
        batch_id: impl Into<String>,
        work_item_id: impl Into<String>,
        port: u16,
        base_uri: impl Into<String>,
        token: CancellationToken,
    ) -> Self {
        Self {
            id: id.into(),
            batch_id: batch_id.into(),
            work_item_id: work_item_id.into(),
            port,
            base_uri: base_uri.into(),
            token,
            connection: None,
            state: SessionState::Pending,
            idle_since: Instant::now(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn work_item_id(&self) -> &str {
        &self.work_item_id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        if state == SessionState::Provisioned {
            self.idle_since = Instant::now();
        }
        self.state = state;
    }

    /// Whether the session has waited for a client for at least `grace`
    pub fn idle_for(&self, grace: std::time::Duration) -> bool {
        self.state == SessionState::Provisioned && self.idle_since.elapsed() >= grace
    }

    pub(crate) fn bind_connection(&mut self, connection: CancellationToken) {
        self.connection = Some(connection);
        self.state = SessionState::Connected;
    }

    /// Drop the bound connection, cancelling its relay
    pub(crate) fn release_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.cancel();
        }
    }

    /// Tear the session down: cancel the lifetime token and any bound relay
    pub(crate) fn close(mut self) -> u16 {
        self.release_connection();
        self.token.cancel();
        self.state = SessionState::Closed;
        self.port
    }

    /// Snapshot of the session for listing
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            batch_id: self.batch_id.clone(),
            work_item_id: self.work_item_id.clone(),
            port: self.port,
            state: self.state,
            created_at: self.created_at,
        }
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub batch_id: String,
    pub work_item_id: String,
    pub port: u16,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}
