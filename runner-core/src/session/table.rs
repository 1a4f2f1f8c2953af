//! Concurrent session table
//!
//! Every state transition happens under the table's write lock, so the
//! reaper's scan and a relay's attach never interleave on the same session.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::RunnerError;

use super::state::{Session, SessionInfo, SessionState};

/// What a relay needs to dial a session's worker
#[derive(Debug, Clone)]
pub struct Attachment {
    pub session_id: String,
    pub port: u16,
    /// Lifetime token of the session
    pub token: CancellationToken,
}

/// Maps session ids to session records
#[derive(Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session
    pub async fn insert(&self, session: Session) {
        let id = session.id().to_string();
        if let Some(previous) = self.sessions.write().await.insert(id.clone(), session) {
            // Session ids are UUIDs; a collision means a caller reused one.
            warn!(session_id = %id, port = previous.port(), "Replaced existing session");
        }
    }

    /// Remove a session, handing the record back for teardown
    pub async fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.write().await.remove(id)
    }

    /// Move the given sessions from `Pending` to `Provisioned`
    pub async fn mark_provisioned(&self, ids: &[String]) {
        let mut sessions = self.sessions.write().await;
        for id in ids {
            if let Some(session) = sessions.get_mut(id)
                && session.state() == SessionState::Pending
            {
                session.set_state(SessionState::Provisioned);
            }
        }
    }

    /// Claim a provisioned or closed session for a relay
    ///
    /// Moves it to `Attaching` so the reaper no longer considers it idle.
    /// A closed session is still registered and owns its port, so a client
    /// may reconnect to it until it is stopped.
    pub async fn begin_attach(&self, id: &str) -> Result<Attachment, RunnerError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| RunnerError::NotFound(id.to_string()))?;

        match session.state() {
            SessionState::Provisioned | SessionState::Closed => {
                session.set_state(SessionState::Attaching);
                Ok(Attachment {
                    session_id: id.to_string(),
                    port: session.port(),
                    token: session.token().clone(),
                })
            }
            SessionState::Pending => Err(RunnerError::NotFound(id.to_string())),
            SessionState::Attaching | SessionState::Connected => {
                Err(RunnerError::AlreadyAttached(id.to_string()))
            }
        }
    }

    /// Record the relay bound to an attaching session
    pub async fn bind(&self, id: &str, connection: CancellationToken) -> Result<(), RunnerError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| RunnerError::NotFound(id.to_string()))?;

        if session.state() != SessionState::Attaching {
            return Err(RunnerError::AlreadyAttached(id.to_string()));
        }
        session.bind_connection(connection);
        Ok(())
    }

    /// Give an attaching session back after a failed dial
    pub async fn abort_attach(&self, id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(id)
            && session.state() == SessionState::Attaching
        {
            session.set_state(SessionState::Provisioned);
        }
    }

    /// Mark a connected session closed after its relay ended
    ///
    /// Returns false if the session is gone or was not connected.
    pub async fn mark_closed(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) if session.state() == SessionState::Connected => {
                session.release_connection();
                session.set_state(SessionState::Closed);
                true
            }
            _ => false,
        }
    }

    /// Ids of provisioned sessions nobody attached to within `grace`
    pub async fn ids_idle_for(&self, grace: Duration) -> Vec<String> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.idle_for(grace))
            .map(|s| s.id().to_string())
            .collect()
    }

    /// Remove a session only if it is still in the expected state
    pub async fn remove_if(&self, id: &str, state: SessionState) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.get(id).is_some_and(|s| s.state() == state) {
            sessions.remove(id)
        } else {
            None
        }
    }

    /// Get a snapshot of one session
    pub async fn get(&self, id: &str) -> Option<SessionInfo> {
        self.sessions.read().await.get(id).map(Session::info)
    }

    /// Snapshot of all sessions
    pub async fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .read()
            .await
            .values()
            .map(Session::info)
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
