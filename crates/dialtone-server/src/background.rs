//! Background tasks for the Dialtone server.
//!
//! Includes:
//! - Pruning sessions of calls that stopped sending events.

use crate::flow::CallFlow;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};

/// Starts the idle-session pruning task.
///
/// Hangups normally release a call's state through the status callback; this
/// task catches calls whose callback never arrived. Runs indefinitely.
pub async fn start_pruning_task(flow: Arc<CallFlow>, idle: Duration) {
    if idle.is_zero() {
        tracing::warn!("session pruning task disabled (idle=0)");
        return;
    }

    // Check every minute or idle/2, whichever is smaller (but min 1s).
    let interval_seconds = (idle.as_secs() / 2).clamp(1, 60);
    let interval = Duration::from_secs(interval_seconds);

    tracing::info!(
        idle_seconds = idle.as_secs(),
        interval_seconds,
        "starting session pruning task"
    );

    loop {
        sleep(interval).await;
        prune_once(&flow, Instant::now(), idle);
    }
}

/// One pruning pass. Returns the number of sessions dropped.
pub fn prune_once(flow: &CallFlow, now: Instant, idle: Duration) -> usize {
    let count = flow.prune_idle(now, idle);
    if count > 0 {
        tracing::info!(count, remaining = flow.sessions().len(), "pruned idle sessions");
    }
    count
}
