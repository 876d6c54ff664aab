//! Periodic deletion of connection tickets that were never redeemed.
//!
//! Expired tickets are already refused at redemption time; the reaper
//! bounds storage growth by removing them. Runs on a fixed interval using
//! `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use handoff_core::pending::PendingConnectionStore;
use tokio_util::sync::CancellationToken;

/// Floor for the reap period; `tokio::time::interval` panics on zero.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Run one reap pass, deleting tickets older than `ttl`.
pub async fn reap_once(store: &dyn PendingConnectionStore, ttl: Duration) -> u64 {
    let ttl = match chrono::Duration::from_std(ttl) {
        Ok(ttl) => ttl,
        Err(e) => {
            tracing::error!(error = %e, "Ticket reaper: TTL out of range");
            return 0;
        }
    };
    let cutoff = Utc::now() - ttl;

    match store.reap(cutoff).await {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::info!(deleted, "Ticket reaper: purged expired tickets");
            } else {
                tracing::debug!("Ticket reaper: nothing to purge");
            }
            deleted
        }
        Err(e) => {
            tracing::error!(error = %e, "Ticket reaper: cleanup failed");
            0
        }
    }
}

/// Run the reaper loop until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn PendingConnectionStore>,
    ttl: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    let interval = interval.max(MIN_INTERVAL);
    tracing::info!(
        ttl_secs = ttl.as_secs(),
        interval_secs = interval.as_secs(),
        "Ticket reaper started"
    );

    let mut interval = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Ticket reaper stopping");
                break;
            }
            _ = interval.tick() => {
                reap_once(store.as_ref(), ttl).await;
            }
        }
    }
}
