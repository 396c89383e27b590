use chrono::{DateTime, Utc};
use quickdrop_core::FileRecord;
use quickdrop_registry::ItemStore;
use quickdrop_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: usize,
    pub files_removed: usize,
    pub abandoned_uploads: usize,
}

/// Reaper: evicts expired items and reclaims their files on a fixed interval.
#[derive(Clone)]
pub struct CleanupService {
    store: ItemStore,
    storage: Arc<dyn Storage>,
    interval: Duration,
    /// Reservations older than this are treated as abandoned uploads.
    upload_timeout: chrono::Duration,
}

impl CleanupService {
    pub fn new(
        store: ItemStore,
        storage: Arc<dyn Storage>,
        interval: Duration,
        upload_timeout: chrono::Duration,
    ) -> Self {
        Self {
            store,
            storage,
            interval,
            upload_timeout,
        }
    }

    /// Start the background sweep loop.
    ///
    /// The loop sleeps one full interval before the first sweep and runs until the returned
    /// handle is aborted.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.interval;
            let mut sweep_interval = interval_at(Instant::now() + period, period);
            sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                interval_secs = period.as_secs(),
                "Reaper started"
            );

            loop {
                sweep_interval.tick().await;
                let report = self.sweep().await;

                if report != SweepReport::default() {
                    tracing::info!(
                        evicted = report.evicted,
                        files_removed = report.files_removed,
                        abandoned_uploads = report.abandoned_uploads,
                        "Sweep completed"
                    );
                }
            }
        })
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Evict everything expired at `now`.
    ///
    /// Each entry is removed from the registry before its files are deleted, so no reader
    /// can be handed a record whose file is about to disappear. The code is released for
    /// reuse only after the deletion. Deletion failures are logged by the storage backend
    /// and never abort the sweep.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "sweep"))]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        let expired = self
            .store
            .snapshot()
            .await
            .into_iter()
            .filter(|(_, item)| !item.is_live_at(now));

        for (code, _) in expired {
            // Re-checked under the lock: the code may have been re-issued since the snapshot.
            let Some(item) = self.store.remove_expired(&code, now).await else {
                continue;
            };

            tracing::info!(
                code = %code,
                expires_at = %item.expires_at,
                files = item.files.len(),
                "Item reclaimed"
            );

            report.files_removed += self.remove_files(&item.files).await;
            self.store.finish_reclaim(&code).await;
            report.evicted += 1;
        }

        let cutoff = now - self.upload_timeout;
        for (code, files) in self.store.drop_stale_reservations(cutoff).await {
            tracing::warn!(
                code = %code,
                files = files.len(),
                "Reclaiming abandoned upload"
            );
            report.files_removed += self.remove_files(&files).await;
            self.store.finish_reclaim(&code).await;
            report.abandoned_uploads += 1;
        }

        report
    }

    async fn remove_files(&self, files: &[FileRecord]) -> usize {
        for record in files {
            tracing::debug!(
                storage_key = %record.storage_key,
                display_name = %record.display_name,
                "Deleting expired file"
            );
            self.storage.remove(record).await;
        }
        files.len()
    }
}
