//! Client stream to worker relay

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::SessionCoordinator;
use crate::error::{RelayError, RunnerError};
use crate::session::SessionRef;

use super::pump::{PumpOutcome, PumpReport, pump};
use super::{FrameSink, FrameStream, WorkerConnection, WorkerDialer};

/// What both directions of a finished relay did
#[derive(Debug)]
pub struct RelayStats {
    pub session_id: String,
    pub client_to_worker: PumpReport,
    pub worker_to_client: PumpReport,
}

/// Bridges client streams to the worker behind each session
pub struct StreamRelay {
    coordinator: Arc<SessionCoordinator>,
    dialer: Arc<dyn WorkerDialer>,
}

impl StreamRelay {
    pub fn new(coordinator: Arc<SessionCoordinator>, dialer: Arc<dyn WorkerDialer>) -> Self {
        Self {
            coordinator,
            dialer,
        }
    }

    pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
        &self.coordinator
    }

    /// Relay an already identified client stream until either side ends
    ///
    /// Fails without touching the streams when the session is unknown,
    /// already attached, or its worker cannot be dialed. Once relaying
    /// starts the result is always `Ok`; per-direction failures are in the
    /// returned stats.
    pub async fn serve(
        &self,
        sref: &SessionRef,
        inbound: FrameStream,
        outbound: FrameSink,
    ) -> Result<RelayStats, RunnerError> {
        let attachment = self.coordinator.attach(sref).await?;
        let session_id = attachment.session_id.clone();

        let worker = match self.dial(&attachment.token, attachment.port).await {
            Ok(worker) => worker,
            Err(e) => {
                warn!(session_id = %session_id, port = attachment.port, error = %e, "Worker dial failed");
                self.coordinator.abort_attach(&session_id).await;
                return Err(e.into());
            }
        };

        // Child of the session token, so Stop and shutdown end the relay.
        let relay_token = attachment.token.child_token();
        self.coordinator.bind(&session_id, relay_token.clone()).await?;
        info!(session_id = %session_id, port = attachment.port, "Relay connected");

        let downstream = tokio::spawn(pump(worker.stream, outbound, relay_token.clone()));
        let client_to_worker = pump(inbound, worker.sink, relay_token.clone()).await;
        relay_token.cancel();

        let worker_to_client = match downstream.await {
            Ok(report) => report,
            Err(e) => PumpReport {
                frames: 0,
                bytes: 0,
                outcome: PumpOutcome::Failed(RelayError::Read(format!(
                    "downstream task failed: {}",
                    e
                ))),
            },
        };

        self.coordinator.detach(&session_id).await;
        info!(
            session_id = %session_id,
            upstream_frames = client_to_worker.frames,
            downstream_frames = worker_to_client.frames,
            upstream = ?client_to_worker.outcome,
            downstream = ?worker_to_client.outcome,
            "Relay ended"
        );

        Ok(RelayStats {
            session_id,
            client_to_worker,
            worker_to_client,
        })
    }

    /// Dial the session's worker, giving up on Stop, shutdown or timeout
    ///
    /// A worker may accept the TCP connection long before it answers the
    /// websocket handshake.
    async fn dial(
        &self,
        token: &CancellationToken,
        port: u16,
    ) -> Result<WorkerConnection, RelayError> {
        let timeout = self.coordinator.config().handshake_timeout;
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(RelayError::DialAborted {
                port,
                reason: "session stopped",
            }),
            dialed = tokio::time::timeout(timeout, self.dialer.dial(port)) => {
                dialed.unwrap_or(Err(RelayError::DialAborted {
                    port,
                    reason: "handshake timed out",
                }))
            }
        }
    }

    /// Relay a stream whose first frame names the session
    pub async fn serve_first_frame(
        &self,
        mut inbound: FrameStream,
        outbound: FrameSink,
    ) -> Result<RelayStats, RunnerError> {
        let first = match inbound.next().await {
            Some(frame) => frame?,
            None => return Err(RelayError::ClosedBeforeOpen.into()),
        };
        let sref = SessionRef::from_frame(&first)?;
        debug!(session_id = %sref.session_id, "Stream opened by first frame");
        self.serve(&sref, inbound, outbound).await
    }
}
