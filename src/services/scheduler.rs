//! Auto-refresh scheduler
//!
//! Re-syncs every remote playlist on a fixed interval. Runs go through the
//! engine like any other refresh, so a playlist already syncing is joined
//! rather than fetched twice.

use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

use crate::services::sync::SyncEngine;

/// Result of one refresh cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshResult {
    pub succeeded: usize,
    pub failed: usize,
}

impl RefreshResult {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Run a single refresh cycle
pub async fn run_refresh(engine: &SyncEngine) -> RefreshResult {
    match engine.refresh_all().await {
        Ok((succeeded, failed)) => {
            if succeeded + failed > 0 {
                tracing::info!("Auto-refresh: {} playlists synced, {} failed", succeeded, failed);
            }
            RefreshResult { succeeded, failed }
        }
        Err(e) => {
            tracing::error!("Auto-refresh: listing playlists failed: {}", e);
            RefreshResult {
                succeeded: 0,
                failed: 1,
            }
        }
    }
}

/// Start the background refresh task
///
/// The first cycle runs one full interval after startup. This should be
/// spawned as a background task using `tokio::spawn`.
pub async fn start_refresh_task(engine: SyncEngine, interval_secs: u64) {
    tracing::info!("Starting auto-refresh task (interval: {}s)", interval_secs);

    let period = Duration::from_secs(interval_secs.max(1));
    let mut interval = time::interval_at(time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let result = run_refresh(&engine).await;
        if !result.is_success() {
            tracing::warn!("Auto-refresh cycle had {} failures", result.failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::models::{DataSource, Playlist, SyncStrategy};
    use crate::store::{InMemoryStore, PlaylistStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_refresh_cycle_skips_local_and_epg() {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_playlist(&Playlist::new("Disk", "/tmp/list.m3u", DataSource::LocalFile, SyncStrategy::All))
            .await
            .unwrap();
        store
            .upsert_playlist(&Playlist::new("Guide", "http://x/epg.xml", DataSource::Epg, SyncStrategy::All))
            .await
            .unwrap();

        let engine = SyncEngine::new(store.clone(), SyncConfig::default()).unwrap();
        let result = run_refresh(&engine).await;

        assert_eq!(result, RefreshResult::default());
        assert!(result.is_success());
        assert_eq!(store.channel_writes(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_playlist_counts_as_failure() {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_playlist(&Playlist::new("Dead", "http://127.0.0.1:1/list.m3u", DataSource::M3u, SyncStrategy::All))
            .await
            .unwrap();

        let engine = SyncEngine::new(store, SyncConfig::default()).unwrap();
        let result = run_refresh(&engine).await;

        assert_eq!(result, RefreshResult { succeeded: 0, failed: 1 });
    }
}
