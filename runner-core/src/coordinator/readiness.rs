//! One-shot readiness handshake between `Start` and the initializer

use std::time::Duration;

use tokio::sync::oneshot;

/// Sending half, owned by whoever brings the workers up
#[derive(Debug)]
pub struct ReadySignal {
    tx: oneshot::Sender<Result<(), String>>,
}

/// Receiving half, awaited by the `Start` caller
#[derive(Debug)]
pub struct ReadinessGate {
    rx: oneshot::Receiver<Result<(), String>>,
}

/// How a readiness wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Ready,
    Failed(String),
    /// The signal was dropped without firing
    Abandoned,
    TimedOut,
}

/// Create a linked signal and gate
pub fn readiness_gate() -> (ReadySignal, ReadinessGate) {
    let (tx, rx) = oneshot::channel();
    (ReadySignal { tx }, ReadinessGate { rx })
}

impl ReadySignal {
    /// Report the batch ready
    pub fn ready(self) {
        // The waiter may have timed out already
        let _ = self.tx.send(Ok(()));
    }

    /// Report that the batch could not be prepared
    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(reason.into()));
    }

    /// Whether the waiting side has given up
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

impl ReadinessGate {
    /// Wait for the signal, up to `timeout`
    pub async fn wait(self, timeout: Duration) -> GateOutcome {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(Ok(()))) => GateOutcome::Ready,
            Ok(Ok(Err(reason))) => GateOutcome::Failed(reason),
            Ok(Err(_)) => GateOutcome::Abandoned,
            Err(_) => GateOutcome::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_opens_gate() {
        let (signal, gate) = readiness_gate();
        signal.ready();
        assert_eq!(gate.wait(Duration::from_secs(1)).await, GateOutcome::Ready);
    }

    #[tokio::test]
    async fn fail_carries_reason() {
        let (signal, gate) = readiness_gate();
        signal.fail("docker pull failed");
        assert_eq!(
            gate.wait(Duration::from_secs(1)).await,
            GateOutcome::Failed("docker pull failed".to_string())
        );
    }

    #[tokio::test]
    async fn dropped_signal_is_abandoned() {
        let (signal, gate) = readiness_gate();
        drop(signal);
        assert_eq!(
            gate.wait(Duration::from_secs(1)).await,
            GateOutcome::Abandoned
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silent_signal_times_out() {
        let (_signal, gate) = readiness_gate();
        assert_eq!(
            gate.wait(Duration::from_secs(10)).await,
            GateOutcome::TimedOut
        );
    }

    #[tokio::test]
    async fn signal_sees_abandoned_gate() {
        let (signal, gate) = readiness_gate();
        drop(gate);
        assert!(signal.is_abandoned());
        signal.ready();
    }

    #[tokio::test]
    async fn signal_fires_from_another_task() {
        let (signal, gate) = readiness_gate();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            signal.ready();
        });
        assert_eq!(gate.wait(Duration::from_secs(2)).await, GateOutcome::Ready);
    }
}
