use chrono::{DateTime, Utc};
use quickdrop_core::{AppError, CodeSource, FileRecord, Item, PickupCode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// How many candidate codes `reserve` draws before giving up.
pub const MAX_RESERVE_ATTEMPTS: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Pickup code not found or expired: {0}")]
    NotFound(String),

    #[error("Reservation for pickup code {0} no longer exists")]
    ReservationLost(String),

    #[error("No free pickup code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: usize },
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => {
                AppError::NotFound("Pickup code is invalid or expired".to_string())
            }
            RegistryError::ReservationLost(code) => {
                AppError::WriteError(format!("Upload for {} timed out before completion", code))
            }
            RegistryError::CodeSpaceExhausted { .. } => AppError::Unavailable(
                "No pickup code is available right now".to_string(),
            ),
        }
    }
}

/// A code handed out to an in-flight submission.
#[derive(Debug)]
pub struct Reservation {
    pub code: PickupCode,
    /// Expired item that still occupied the code. Its files belong to the caller now.
    pub displaced: Option<Arc<Item>>,
}

#[derive(Debug)]
struct Pending {
    reserved_at: DateTime<Utc>,
    files: Vec<FileRecord>,
}

#[derive(Debug, Default)]
struct Registry {
    items: HashMap<PickupCode, Arc<Item>>,
    pending: HashMap<PickupCode, Pending>,
    /// Codes whose files are being deleted. Storage keys derive from the code, so these are
    /// not reissued until `finish_reclaim`.
    reclaiming: HashSet<PickupCode>,
}

/// Concurrent code → item mapping.
///
/// Besides committed items the store tracks reservations: codes that were handed to a
/// submission whose files are still being written. A reserved code is never issued twice and
/// never visible to readers until the submission completes. A code that was evicted or
/// released stays blocked until its files are gone.
#[derive(Clone, Default)]
pub struct ItemStore {
    inner: Arc<Mutex<Registry>>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick an unused code and reserve it for a new submission.
    ///
    /// Candidates that are live or already reserved are skipped. A candidate occupied by an
    /// expired item that the reaper has not collected yet is taken over; the old item is
    /// returned in the reservation so its files can be reclaimed.
    pub async fn reserve(
        &self,
        codes: &dyn CodeSource,
        now: DateTime<Utc>,
    ) -> Result<Reservation, RegistryError> {
        let mut registry = self.inner.lock().await;

        for attempt in 1..=MAX_RESERVE_ATTEMPTS {
            let code = codes.next_code();

            if registry.pending.contains_key(&code) {
                tracing::debug!(code = %code, attempt, "Pickup code already reserved, retrying");
                continue;
            }
            if registry.reclaiming.contains(&code) {
                tracing::debug!(code = %code, attempt, "Pickup code still being reclaimed, retrying");
                continue;
            }
            if registry
                .items
                .get(&code)
                .map(|item| item.is_live_at(now))
                .unwrap_or(false)
            {
                tracing::debug!(code = %code, attempt, "Pickup code occupied by live item, retrying");
                continue;
            }

            let displaced = registry.items.remove(&code);
            registry.pending.insert(
                code.clone(),
                Pending {
                    reserved_at: now,
                    files: Vec::new(),
                },
            );
            return Ok(Reservation { code, displaced });
        }

        tracing::warn!(
            attempts = MAX_RESERVE_ATTEMPTS,
            live_items = registry.items.len(),
            "Could not find a free pickup code"
        );
        Err(RegistryError::CodeSpaceExhausted {
            attempts: MAX_RESERVE_ATTEMPTS,
        })
    }

    /// Record a file persisted under a reservation so it can be reclaimed if the submission
    /// is abandoned.
    pub async fn track_pending_file(
        &self,
        code: &PickupCode,
        record: FileRecord,
    ) -> Result<(), RegistryError> {
        let mut registry = self.inner.lock().await;
        match registry.pending.get_mut(code) {
            Some(pending) => {
                pending.files.push(record);
                Ok(())
            }
            None => Err(RegistryError::ReservationLost(code.to_string())),
        }
    }

    /// Turn a reservation into a committed item.
    ///
    /// Fails if the reservation was dropped in the meantime (see `drop_stale_reservations`),
    /// in which case the files it tracked have already been handed out for reclamation.
    pub async fn complete(&self, code: &PickupCode, item: Item) -> Result<Arc<Item>, RegistryError> {
        let mut registry = self.inner.lock().await;
        if registry.pending.remove(code).is_none() {
            return Err(RegistryError::ReservationLost(code.to_string()));
        }

        let item = Arc::new(item);
        registry.items.insert(code.clone(), Arc::clone(&item));
        Ok(item)
    }

    /// Cancel a reservation and return the files persisted under it.
    ///
    /// Returns `None` if the reservation is already gone. Otherwise the code stays blocked
    /// until the caller has deleted the files and called `finish_reclaim`.
    pub async fn release(&self, code: &PickupCode) -> Option<Vec<FileRecord>> {
        let mut registry = self.inner.lock().await;
        let pending = registry.pending.remove(code)?;
        registry.reclaiming.insert(code.clone());
        Some(pending.files)
    }

    /// Make a code handed out by `release`, `remove_expired` or `drop_stale_reservations`
    /// available again once its files have been deleted.
    pub async fn finish_reclaim(&self, code: &PickupCode) {
        let mut registry = self.inner.lock().await;
        registry.reclaiming.remove(code);
    }

    /// Insert or overwrite the entry for `code`.
    ///
    /// The previous occupant, if any, is returned; its files are the caller's to reclaim.
    pub async fn put(&self, code: PickupCode, item: Item) -> Option<Arc<Item>> {
        let mut registry = self.inner.lock().await;
        registry.pending.remove(&code);
        registry.items.insert(code, Arc::new(item))
    }

    /// Look up a live item.
    pub async fn get(&self, code: &PickupCode) -> Result<Arc<Item>, RegistryError> {
        self.get_at(code, Utc::now()).await
    }

    /// Look up an item that is live at `now`. Present-but-expired entries are reported as
    /// not found.
    pub async fn get_at(
        &self,
        code: &PickupCode,
        now: DateTime<Utc>,
    ) -> Result<Arc<Item>, RegistryError> {
        let registry = self.inner.lock().await;
        registry
            .items
            .get(code)
            .filter(|item| item.is_live_at(now))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(code.to_string()))
    }

    /// Remove the entry unconditionally. Backing files are left to the caller.
    pub async fn delete(&self, code: &PickupCode) -> Option<Arc<Item>> {
        let mut registry = self.inner.lock().await;
        registry.items.remove(code)
    }

    /// Point-in-time copy of all committed entries, live or not.
    pub async fn snapshot(&self) -> Vec<(PickupCode, Arc<Item>)> {
        let registry = self.inner.lock().await;
        registry
            .items
            .iter()
            .map(|(code, item)| (code.clone(), Arc::clone(item)))
            .collect()
    }

    /// Remove the entry for `code` only if it is expired at `now`.
    ///
    /// The check and the removal happen under one lock acquisition, so an entry that was
    /// replaced by a fresh item after a snapshot is left alone. A removed code is blocked
    /// until `finish_reclaim`.
    pub async fn remove_expired(&self, code: &PickupCode, now: DateTime<Utc>) -> Option<Arc<Item>> {
        let mut registry = self.inner.lock().await;
        let expired = registry
            .items
            .get(code)
            .map(|item| !item.is_live_at(now))
            .unwrap_or(false);

        if !expired {
            return None;
        }
        let item = registry.items.remove(code)?;
        registry.reclaiming.insert(code.clone());
        Some(item)
    }

    /// Drop reservations made before `cutoff` and return the files persisted under them.
    ///
    /// Each returned code is blocked until `finish_reclaim`.
    pub async fn drop_stale_reservations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Vec<(PickupCode, Vec<FileRecord>)> {
        let mut registry = self.inner.lock().await;
        let stale: Vec<PickupCode> = registry
            .pending
            .iter()
            .filter(|(_, pending)| pending.reserved_at < cutoff)
            .map(|(code, _)| code.clone())
            .collect();

        let mut dropped = Vec::with_capacity(stale.len());
        for code in stale {
            if let Some(pending) = registry.pending.remove(&code) {
                registry.reclaiming.insert(code.clone());
                dropped.push((code, pending.files));
            }
        }
        dropped
    }

    /// Number of items live at `now`.
    pub async fn live_count(&self, now: DateTime<Utc>) -> usize {
        let registry = self.inner.lock().await;
        registry
            .items
            .values()
            .filter(|item| item.is_live_at(now))
            .count()
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }
}
