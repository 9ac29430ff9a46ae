//! Monitor loop
//!
//! Runs a background task that wakes on a fixed period while the session is
//! running and asks the manager to check for a stalled transport.

use super::manager::Inner;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle to a running monitor task
pub(crate) struct MonitorHandle {
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

/// Spawn the monitor. The first tick fires one full period after start.
pub(crate) fn spawn(inner: Weak<Inner>, period: Duration) -> MonitorHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Manager dropped without stop()
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.monitor_tick().await;
        }

        debug!("[MONITOR] Stopped");
    });

    MonitorHandle { cancel, task }
}
