//! Session coordinator
//!
//! The coordinator turns a work request into a batch of sibling sessions,
//! each bound to its own pooled port, and hands the batch to the initializer.
//! It also owns the transitions the relay and the reaper drive.

mod batch;
pub mod initializer;
pub mod readiness;
mod reaper;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::credentials::TokenModel;
use crate::error::RunnerError;
use crate::pool::PortPool;
use crate::session::{Attachment, Session, SessionInfo, SessionRef, SessionState, SessionTable};

use batch::BatchGuard;
use readiness::GateOutcome;

pub use initializer::{
    ImmediatePreparer, PrepareJob, PrepareRequest, WorkerPreparer, spawn_initializer,
};
pub use readiness::{ReadinessGate, ReadySignal, readiness_gate};

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Id of this service instance, embedded in issued URLs
    pub server_id: String,
    /// Sessions created per `Start`
    pub fan_out: usize,
    /// Bound on the initializer handoff and on the readiness wait
    pub handshake_timeout: Duration,
    /// Period of the idle-session sweep
    pub reaper_interval: Duration,
    /// Batches allowed to queue for the initializer
    pub handoff_capacity: usize,
    /// Stop a session as soon as its relay ends
    pub release_on_disconnect: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            server_id: Uuid::new_v4().to_string(),
            fan_out: 4,
            handshake_timeout: Duration::from_secs(10),
            reaper_interval: Duration::from_secs(6),
            handoff_capacity: 1,
            release_on_disconnect: false,
        }
    }
}

/// Input to `Start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequest {
    pub work_item_id: String,
    /// Prefix for the issued stream and stop URLs
    pub base_uri: String,
}

impl WorkRequest {
    pub fn new(work_item_id: impl Into<String>, base_uri: impl Into<String>) -> Self {
        Self {
            work_item_id: work_item_id.into(),
            base_uri: base_uri.into(),
        }
    }
}

/// Connection descriptors returned by `Start`, one pair per session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub stream_urls: Vec<String>,
    pub stop_urls: Vec<String>,
}

/// Orchestrates session batches over a shared port pool
pub struct SessionCoordinator {
    config: CoordinatorConfig,
    pool: Arc<PortPool>,
    table: Arc<SessionTable>,
    handoff: mpsc::Sender<PrepareJob>,
    shutdown: CancellationToken,
}

impl SessionCoordinator {
    /// Create a coordinator feeding batches into `handoff`
    ///
    /// The caller is responsible for draining the receiving side.
    pub fn new(
        config: CoordinatorConfig,
        pool: Arc<PortPool>,
        table: Arc<SessionTable>,
        handoff: mpsc::Sender<PrepareJob>,
    ) -> Self {
        Self {
            config,
            pool,
            table,
            handoff,
            shutdown: CancellationToken::new(),
        }
    }

    /// Create a coordinator with its initializer and reaper running
    pub fn spawn(
        config: CoordinatorConfig,
        pool: Arc<PortPool>,
        table: Arc<SessionTable>,
        preparer: Arc<dyn WorkerPreparer>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.handoff_capacity.max(1));
        let coordinator = Arc::new(Self::new(config, pool, table, tx));
        spawn_initializer(rx, preparer, coordinator.shutdown.child_token());
        coordinator.spawn_reaper();
        coordinator
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn server_id(&self) -> &str {
        &self.config.server_id
    }

    pub fn pool(&self) -> &Arc<PortPool> {
        &self.pool
    }

    pub fn table(&self) -> &Arc<SessionTable> {
        &self.table
    }

    /// Provision a batch of sessions for a work item
    ///
    /// Either every session of the batch is registered and ready, or none is
    /// and every acquired port is back in the pool.
    pub async fn start(
        &self,
        request: WorkRequest,
        credential: Option<TokenModel>,
    ) -> Result<StartResponse, RunnerError> {
        let fan_out = self.config.fan_out;
        let ports = self.pool.acquire_many(fan_out).inspect_err(|e| {
            warn!(work_item_id = %request.work_item_id, error = %e, "Start rejected");
        })?;

        let batch_id = Uuid::new_v4().to_string();
        let batch_token = self.shutdown.child_token();
        let mut guard = BatchGuard::new(
            Arc::clone(&self.pool),
            Arc::clone(&self.table),
            batch_token.clone(),
            ports.clone(),
        );

        let (signal, gate) = readiness_gate();
        let job = PrepareJob {
            request: PrepareRequest {
                batch_id: batch_id.clone(),
                work_item_id: request.work_item_id.clone(),
                base_uri: request.base_uri.clone(),
                ports,
                credential,
                cancel: batch_token.clone(),
            },
            signal,
        };

        match tokio::time::timeout(self.config.handshake_timeout, self.handoff.send(job)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                guard.rollback().await;
                return Err(RunnerError::InitializerClosed);
            }
            Err(_) => {
                warn!(work_item_id = %request.work_item_id, "Initializer handoff timed out");
                guard.rollback().await;
                return Err(RunnerError::PrepareTimeout(request.work_item_id));
            }
        }

        let mut response = StartResponse {
            stream_urls: Vec::with_capacity(fan_out),
            stop_urls: Vec::with_capacity(fan_out),
        };
        let batch_ports = guard.ports().to_vec();
        for port in batch_ports {
            let session_id = Uuid::new_v4().to_string();
            response
                .stream_urls
                .push(self.stream_url(&request.base_uri, &session_id));
            response
                .stop_urls
                .push(self.stop_url(&request.base_uri, &session_id));

            let session = Session::new(
                session_id.clone(),
                batch_id.clone(),
                request.work_item_id.clone(),
                port,
                request.base_uri.clone(),
                batch_token.child_token(),
            );
            self.table.insert(session).await;
            guard.record(session_id);
        }

        let failure = match gate.wait(self.config.handshake_timeout).await {
            GateOutcome::Ready => None,
            GateOutcome::TimedOut => Some(RunnerError::StartupTimeout(request.work_item_id.clone())),
            GateOutcome::Failed(reason) => Some(RunnerError::PrepareFailed {
                work_item_id: request.work_item_id.clone(),
                reason,
            }),
            GateOutcome::Abandoned => Some(RunnerError::PrepareFailed {
                work_item_id: request.work_item_id.clone(),
                reason: "initializer dropped the batch".to_string(),
            }),
        };

        if let Some(err) = failure {
            warn!(batch_id = %batch_id, error = %err, "Start failed, rolling back batch");
            guard.rollback().await;
            return Err(err);
        }

        self.table.mark_provisioned(guard.session_ids()).await;
        info!(
            batch_id = %batch_id,
            work_item_id = %request.work_item_id,
            ports = ?guard.ports(),
            "Batch provisioned"
        );
        guard.commit();

        Ok(response)
    }

    /// Tear a session down and return its port
    pub async fn stop(&self, session_id: &str) -> Result<(), RunnerError> {
        match self.evict(session_id).await {
            Some(port) => {
                info!(session_id = %session_id, port, "Session stopped");
                Ok(())
            }
            None => Err(RunnerError::NotFound(session_id.to_string())),
        }
    }

    /// Stop a session referenced by an issued URL
    pub async fn stop_ref(&self, sref: &SessionRef) -> Result<(), RunnerError> {
        self.check_instance(sref)?;
        self.stop(&sref.session_id).await
    }

    /// Claim a provisioned or closed session for a relay
    pub async fn attach(&self, sref: &SessionRef) -> Result<Attachment, RunnerError> {
        self.check_instance(sref)?;
        self.table.begin_attach(&sref.session_id).await
    }

    /// Record the relay bound to an attaching session
    pub async fn bind(
        &self,
        session_id: &str,
        connection: CancellationToken,
    ) -> Result<(), RunnerError> {
        self.table.bind(session_id, connection).await
    }

    /// Hand an attaching session back after its dial failed
    pub async fn abort_attach(&self, session_id: &str) {
        self.table.abort_attach(session_id).await;
    }

    /// Called when a session's relay has ended
    pub async fn detach(&self, session_id: &str) {
        if self.config.release_on_disconnect {
            if self.stop(session_id).await.is_ok() {
                debug!(session_id = %session_id, "Released session after relay ended");
            }
        } else if self.table.mark_closed(session_id).await {
            debug!(session_id = %session_id, "Relay ended, session held until stop");
        }
    }

    /// Evict sessions left unattached for a whole reaper interval
    ///
    /// Returns the number of sessions evicted.
    pub async fn reap_idle(&self) -> usize {
        self.reap_idle_for(self.config.reaper_interval).await
    }

    /// Evict every provisioned session idle for at least `grace`
    pub async fn reap_idle_for(&self, grace: Duration) -> usize {
        let mut evicted = 0;
        for id in self.table.ids_idle_for(grace).await {
            // Re-checked under the write lock: a relay may have attached since the scan.
            if let Some(session) = self.table.remove_if(&id, SessionState::Provisioned).await {
                let port = session.close();
                self.pool.release(port);
                debug!(session_id = %id, port, "Reaped idle session");
                evicted += 1;
            }
        }
        evicted
    }

    /// Start the periodic idle-session sweep
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(reaper::run(
            Arc::downgrade(self),
            self.config.reaper_interval,
            self.shutdown.child_token(),
        ))
    }

    /// Snapshot of all sessions
    pub async fn sessions(&self) -> Vec<SessionInfo> {
        self.table.list().await
    }

    pub async fn session_count(&self) -> usize {
        self.table.len().await
    }

    /// Stop background tasks and cancel every batch
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn check_instance(&self, sref: &SessionRef) -> Result<(), RunnerError> {
        match &sref.instance_id {
            Some(id) if id != &self.config.server_id => Err(RunnerError::ForeignInstance {
                session_id: sref.session_id.clone(),
                instance_id: id.clone(),
            }),
            _ => Ok(()),
        }
    }

    async fn evict(&self, session_id: &str) -> Option<u16> {
        let session = self.table.remove(session_id).await?;
        let port = session.close();
        self.pool.release(port);
        Some(port)
    }

    fn stream_url(&self, base_uri: &str, session_id: &str) -> String {
        format!(
            "{}Services.Stream?_id={}&_sid={}",
            base_uri, self.config.server_id, session_id
        )
    }

    fn stop_url(&self, base_uri: &str, session_id: &str) -> String {
        format!(
            "{}Services.Stop?_id={}&_sid={}",
            base_uri, self.config.server_id, session_id
        )
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
