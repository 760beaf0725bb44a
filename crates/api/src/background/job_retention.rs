//! Periodic cleanup of finished jobs.
//!
//! Applies the configured [`RetentionPolicy`] to the job store on a fixed
//! interval using `tokio::time::interval`. Only terminal jobs are ever
//! removed.

use std::sync::Arc;
use std::time::Duration;

use procman_db::{JobStore, RetentionPolicy};
use tokio_util::sync::CancellationToken;

/// Run one retention pass. Returns the number of jobs removed, or `None`
/// if the pass failed (the failure is logged).
pub async fn run_once(store: &dyn JobStore, policy: &RetentionPolicy) -> Option<u64> {
    match store.delete_jobs(policy).await {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::info!(deleted, "Job retention: purged finished jobs");
            } else {
                tracing::debug!("Job retention: nothing to purge");
            }
            Some(deleted)
        }
        Err(e) => {
            tracing::error!(error = %e, "Job retention: cleanup failed");
            None
        }
    }
}

/// Run the job retention loop until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn JobStore>,
    policy: RetentionPolicy,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        max_age_secs = policy.max_age.map(|age| age.as_secs()),
        max_count = policy.max_count,
        interval_secs = interval.as_secs(),
        "Job retention task started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention task stopping");
                break;
            }
            _ = ticker.tick() => {
                run_once(store.as_ref(), &policy).await;
            }
        }
    }
}
