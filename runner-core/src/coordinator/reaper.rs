//! Periodic sweep of sessions nobody attached to

use std::sync::Weak;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::SessionCoordinator;

pub(super) async fn run(
    coordinator: Weak<SessionCoordinator>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    debug!(interval_ms = interval.as_millis() as u64, "Reaper started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                let evicted = coordinator.reap_idle().await;
                if evicted > 0 {
                    info!(evicted, "Reaped idle sessions");
                }
            }
        }
    }

    debug!("Reaper stopped");
}
