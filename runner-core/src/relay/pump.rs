//! One direction of a relay

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;

use super::Frame;

/// Why a pump stopped
#[derive(Debug)]
pub enum PumpOutcome {
    /// The source ended cleanly
    Eof,
    /// The relay was torn down from elsewhere
    Cancelled,
    /// Reading the source or writing the sink failed
    Failed(RelayError),
}

/// Frames moved by one pump and how it ended
#[derive(Debug)]
pub struct PumpReport {
    pub frames: u64,
    pub bytes: u64,
    pub outcome: PumpOutcome,
}

impl PumpReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, PumpOutcome::Failed(_))
    }
}

/// Copy frames from `source` to `sink` until either side ends or `cancel` fires
///
/// Whatever the cause, the pump cancels `cancel` on exit so its sibling
/// stops too, and closes `sink`.
pub(crate) async fn pump<S, K>(mut source: S, mut sink: K, cancel: CancellationToken) -> PumpReport
where
    S: Stream<Item = Result<Frame, RelayError>> + Unpin,
    K: Sink<Frame, Error = RelayError> + Unpin,
{
    let mut frames = 0u64;
    let mut bytes = 0u64;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break PumpOutcome::Cancelled,
            next = source.next() => next,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => break PumpOutcome::Failed(e),
            None => break PumpOutcome::Eof,
        };
        let len = frame.len() as u64;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break PumpOutcome::Cancelled,
            sent = sink.send(frame) => {
                if let Err(e) = sent {
                    break PumpOutcome::Failed(e);
                }
            }
        }

        frames += 1;
        bytes += len;
    };

    cancel.cancel();
    let _ = sink.close().await;

    PumpReport {
        frames,
        bytes,
        outcome,
    }
}
