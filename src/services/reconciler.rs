//! Reconciler
//!
//! Merges the freshly parsed channels of one sync run into stored state.
//! Upserts keep user-owned fields. Under [`SyncStrategy::All`] the URLs seen
//! during the run are remembered and, once the whole fetch has been consumed,
//! every other channel of the playlist is deleted in a single predicate
//! delete. Under [`SyncStrategy::Keep`] nothing is ever deleted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::models::{Channel, SyncStrategy};
use crate::store::{PlaylistStore, StoreError};

/// When batches reach storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// Upsert every flushed batch immediately, delete stale rows at the end
    #[default]
    Streaming,
    /// Stage all batches and commit them in one store transaction at the end
    Deferred,
}

impl ReconcileMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "streaming" => Some(ReconcileMode::Streaming),
            "deferred" => Some(ReconcileMode::Deferred),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub upserted: usize,
    pub deleted: u64,
}

/// Per-run reconciliation state
pub struct Reconciler {
    store: Arc<dyn PlaylistStore>,
    playlist_url: String,
    strategy: SyncStrategy,
    mode: ReconcileMode,
    seen: Mutex<HashSet<String>>,
    staged: Mutex<Vec<Channel>>,
    upserted: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn PlaylistStore>,
        playlist_url: &str,
        strategy: SyncStrategy,
        mode: ReconcileMode,
    ) -> Self {
        Self {
            store,
            playlist_url: playlist_url.to_string(),
            strategy,
            mode,
            seen: Mutex::new(HashSet::new()),
            staged: Mutex::new(Vec::new()),
            upserted: AtomicUsize::new(0),
        }
    }

    /// Channels accepted so far (committed, or staged in deferred mode)
    pub fn processed(&self) -> usize {
        match self.mode {
            ReconcileMode::Streaming => self.upserted.load(Ordering::SeqCst),
            ReconcileMode::Deferred => lock(&self.staged).len(),
        }
    }

    /// Accept one flushed batch
    pub async fn apply_batch(&self, batch: Vec<Channel>) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        {
            let mut seen = lock(&self.seen);
            seen.extend(batch.iter().map(|c| c.url.clone()));
        }

        match self.mode {
            ReconcileMode::Streaming => {
                let count = self.store.upsert_channels(&batch).await?;
                let total = self.upserted.fetch_add(count, Ordering::SeqCst) + count;
                debug!(playlist = %self.playlist_url, batch = count, total, "Committed channel batch");
            }
            ReconcileMode::Deferred => {
                lock(&self.staged).extend(batch);
            }
        }

        Ok(())
    }

    /// Finish the run. The stale delete only happens when `complete` is set,
    /// i.e. the whole upstream fetch succeeded.
    pub async fn finish(&self, complete: bool) -> Result<ReconcileOutcome, StoreError> {
        let keep: Option<HashSet<String>> = (complete && self.strategy.deletes_stale())
            .then(|| std::mem::take(&mut *lock(&self.seen)));

        let outcome = match self.mode {
            ReconcileMode::Streaming => {
                let deleted = match &keep {
                    Some(keep) => {
                        self.store
                            .delete_channels_not_in(&self.playlist_url, keep)
                            .await?
                    }
                    None => 0,
                };
                ReconcileOutcome {
                    upserted: self.upserted.load(Ordering::SeqCst),
                    deleted,
                }
            }
            ReconcileMode::Deferred => {
                let staged = std::mem::take(&mut *lock(&self.staged));
                let (upserted, deleted) = self
                    .store
                    .commit_channels(&self.playlist_url, &staged, keep.as_ref())
                    .await?;
                self.upserted.fetch_add(upserted, Ordering::SeqCst);
                ReconcileOutcome { upserted, deleted }
            }
        };

        if !complete && self.strategy.deletes_stale() {
            info!(playlist = %self.playlist_url, "Sync incomplete, skipping stale channel removal");
        }

        Ok(outcome)
    }
}
