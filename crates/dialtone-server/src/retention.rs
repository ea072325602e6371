//! Background task for enforcing media retention.

use dialtone_media::MediaStore;
use std::time::Duration;
use tokio::time::sleep;

/// Starts a background task that periodically deletes expired media files.
///
/// Individual files already schedule their own deletion; the sweep catches
/// files left behind by a restart. This task runs indefinitely.
///
/// # Arguments
///
/// * `store` - Media storage to sweep.
/// * `interval` - Time to wait between sweeps.
pub async fn start_retention_task(store: MediaStore, interval: Duration) {
    tracing::info!(
        interval_seconds = interval.as_secs(),
        dir = %store.dir().display(),
        "starting media retention task"
    );

    loop {
        // Sweep immediately so leftovers from a previous run go first.
        match store.sweep_expired().await {
            Ok(count) if count > 0 => tracing::info!(count, "deleted expired media files"),
            Ok(_) => tracing::debug!("no expired media files to delete"),
            Err(e) => tracing::error!(error = %e, "failed to sweep media storage"),
        }

        sleep(interval).await;
    }
}
