//! Worker initializer
//!
//! `Start` hands each batch to the initializer through a bounded queue. The
//! initializer runs a [`WorkerPreparer`] for the batch and fires its
//! readiness signal when the workers are up.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::credentials::TokenModel;

use super::readiness::ReadySignal;

/// Batch descriptor handed to the initializer
#[derive(Debug, Clone)]
pub struct PrepareRequest {
    pub batch_id: String,
    pub work_item_id: String,
    pub base_uri: String,
    /// Ports acquired for the batch, one per session
    pub ports: Vec<u16>,
    /// Credential registered for the caller's domain
    pub credential: Option<TokenModel>,
    /// Cancelled when `Start` gives up on the batch
    pub cancel: CancellationToken,
}

/// A queued batch together with its readiness signal
#[derive(Debug)]
pub struct PrepareJob {
    pub request: PrepareRequest,
    pub signal: ReadySignal,
}

/// Brings up the workers for a batch
#[async_trait]
pub trait WorkerPreparer: Send + Sync {
    /// Prepare workers listening on `request.ports`
    ///
    /// Returning `Ok` marks the batch ready.
    async fn prepare(&self, request: &PrepareRequest) -> Result<(), String>;
}

/// Preparer for workers that are already running on every pooled port
pub struct ImmediatePreparer;

#[async_trait]
impl WorkerPreparer for ImmediatePreparer {
    async fn prepare(&self, request: &PrepareRequest) -> Result<(), String> {
        debug!(
            batch_id = %request.batch_id,
            work_item_id = %request.work_item_id,
            ports = ?request.ports,
            "Workers assumed ready"
        );
        Ok(())
    }
}

/// Spawn the task draining the handoff queue
///
/// Each batch is prepared in its own task so a slow batch does not hold up
/// the queue. The loop exits when `shutdown` is cancelled or every sender is
/// dropped.
pub fn spawn_initializer(
    mut rx: mpsc::Receiver<PrepareJob>,
    preparer: Arc<dyn WorkerPreparer>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Initializer started");

        loop {
            let job = tokio::select! {
                _ = shutdown.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let preparer = Arc::clone(&preparer);
            tokio::spawn(run_job(job, preparer));
        }

        info!("Initializer stopped");
    })
}

async fn run_job(job: PrepareJob, preparer: Arc<dyn WorkerPreparer>) {
    let PrepareJob { request, signal } = job;

    if request.cancel.is_cancelled() || signal.is_abandoned() {
        debug!(batch_id = %request.batch_id, "Skipping abandoned batch");
        return;
    }

    tokio::select! {
        _ = request.cancel.cancelled() => {
            debug!(batch_id = %request.batch_id, "Batch cancelled during preparation");
        }
        result = preparer.prepare(&request) => match result {
            Ok(()) => {
                debug!(batch_id = %request.batch_id, "Batch ready");
                signal.ready();
            }
            Err(reason) => {
                warn!(batch_id = %request.batch_id, error = %reason, "Batch preparation failed");
                signal.fail(reason);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::coordinator::readiness::{GateOutcome, readiness_gate};

    struct FailingPreparer;

    #[async_trait]
    impl WorkerPreparer for FailingPreparer {
        async fn prepare(&self, _request: &PrepareRequest) -> Result<(), String> {
            Err("no worker image".to_string())
        }
    }

    struct StallingPreparer;

    #[async_trait]
    impl WorkerPreparer for StallingPreparer {
        async fn prepare(&self, _request: &PrepareRequest) -> Result<(), String> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn request(cancel: CancellationToken) -> PrepareRequest {
        PrepareRequest {
            batch_id: "batch-1".to_string(),
            work_item_id: "work-1".to_string(),
            base_uri: "ws://base/".to_string(),
            ports: vec![9001],
            credential: None,
            cancel,
        }
    }

    async fn submit(
        preparer: Arc<dyn WorkerPreparer>,
        cancel: CancellationToken,
    ) -> (GateOutcome, CancellationToken) {
        let (tx, rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        spawn_initializer(rx, preparer, shutdown.clone());

        let (signal, gate) = readiness_gate();
        tx.send(PrepareJob {
            request: request(cancel),
            signal,
        })
        .await
        .unwrap();

        (gate.wait(Duration::from_millis(500)).await, shutdown)
    }

    #[tokio::test]
    async fn immediate_preparer_fires_ready() {
        let (outcome, shutdown) =
            submit(Arc::new(ImmediatePreparer), CancellationToken::new()).await;
        assert_eq!(outcome, GateOutcome::Ready);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn preparer_failure_reaches_gate() {
        let (outcome, shutdown) = submit(Arc::new(FailingPreparer), CancellationToken::new()).await;
        assert_eq!(outcome, GateOutcome::Failed("no worker image".to_string()));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn cancelled_batch_is_abandoned() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (outcome, shutdown) = submit(Arc::new(ImmediatePreparer), cancel).await;
        assert_eq!(outcome, GateOutcome::Abandoned);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn cancel_interrupts_stalled_preparer() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let (outcome, shutdown) = submit(Arc::new(StallingPreparer), cancel).await;
        assert_eq!(outcome, GateOutcome::Abandoned);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn initializer_stops_on_shutdown() {
        let (_tx, rx) = mpsc::channel::<PrepareJob>(1);
        let shutdown = CancellationToken::new();
        let handle = spawn_initializer(rx, Arc::new(ImmediatePreparer), shutdown.clone());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("initializer did not stop")
            .unwrap();
    }
}
