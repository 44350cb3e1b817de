//! Sync orchestrator
//!
//! [`SyncEngine`] owns every sync run: it opens the upstream, drives the
//! parse → normalize → accumulate → reconcile pipeline, reports progress as a
//! stream of [`Process`] values and guarantees at most one run per playlist
//! URL. A second request for a URL that is already syncing observes the
//! in-flight run instead of starting another one.
//!
//! Runs are spawned eagerly, so dropping a progress stream does not stop the
//! sync; use [`SyncEngine::cancel`] for that.

pub mod error;
pub mod registry;
pub mod source;

use futures::{stream, Stream, StreamExt};
use reqwest::Client;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::models::{Channel, ChannelPatch, DataSource, Playlist, Process, SyncStrategy};
use crate::services::accumulator::Accumulator;
use crate::services::metrics::{self, Outcome};
use crate::services::normalizer::{normalize, NormalizationContext};
use crate::services::reconciler::Reconciler;
use crate::services::xtream::detect_source;
use crate::store::PlaylistStore;

pub use error::SyncError;
pub use registry::{progress_stream, Admission, SyncRegistry, SyncTicket};

pub type ProgressStream = Pin<Box<dyn Stream<Item = Process<()>> + Send>>;

/// Log progress every this many parsed entries
const PROGRESS_LOG_EVERY: usize = 10_000;

/// Counters for one finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub received: usize,
    pub dropped: usize,
    pub upserted: usize,
    pub deleted: u64,
}

struct EngineInner {
    store: Arc<dyn PlaylistStore>,
    http: Client,
    config: SyncConfig,
    registry: SyncRegistry,
}

#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

fn once(process: Process<()>) -> ProgressStream {
    Box::pin(stream::once(async move { process }))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl SyncEngine {
    pub fn new(store: Arc<dyn PlaylistStore>, config: SyncConfig) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .danger_accept_invalid_certs(true) // Many IPTV servers have self-signed certs
            .build()
            .map_err(SyncError::from_reqwest)?;

        Ok(Self {
            inner: Arc::new(EngineInner {
                store,
                http,
                config,
                registry: SyncRegistry::new(),
            }),
        })
    }

    pub fn store(&self) -> &Arc<dyn PlaylistStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &SyncRegistry {
        &self.inner.registry
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Create or update the playlist for `url`, then sync it
    pub async fn subscribe(&self, title: &str, url: &str, strategy: SyncStrategy) -> ProgressStream {
        let (source, credentials) =
            detect_source(url, self.inner.config.local_playlist_dir.as_deref());
        let mut incoming = Playlist::new(title, url, source, strategy);
        incoming.credentials = credentials;

        let playlist = match self.inner.store.get_playlist(url).await {
            Ok(Some(mut existing)) => {
                existing.merge_resubscribe(incoming);
                existing
            }
            Ok(None) => incoming,
            Err(e) => return once(Process::failure(SyncError::from(e).to_string())),
        };

        if let Err(e) = self.inner.store.upsert_playlist(&playlist).await {
            return once(Process::failure(SyncError::from(e).to_string()));
        }

        info!(url = %url, source = %playlist.source, strategy = %strategy, "Playlist subscribed");
        self.start(playlist, strategy)
    }

    /// Register an EPG source. Nothing is fetched.
    pub async fn subscribe_epg(&self, title: &str, url: &str) -> Result<Playlist, SyncError> {
        let playlist = match self.inner.store.get_playlist(url).await? {
            Some(mut existing) => {
                existing.title = title.to_string();
                existing.source = DataSource::Epg;
                existing
            }
            None => Playlist::new(title, url, DataSource::Epg, SyncStrategy::default()),
        };

        self.inner.store.upsert_playlist(&playlist).await?;
        info!(url = %url, "EPG source subscribed");
        Ok(playlist)
    }

    /// Re-sync an existing playlist with `strategy` for this run only
    pub async fn refresh(&self, url: &str, strategy: SyncStrategy) -> ProgressStream {
        let playlist = match self.inner.store.get_playlist(url).await {
            Ok(Some(playlist)) => playlist,
            Ok(None) => {
                return once(Process::failure(
                    SyncError::NotFound(format!("playlist {}", url)).to_string(),
                ))
            }
            Err(e) => return once(Process::failure(SyncError::from(e).to_string())),
        };

        // Local content is not externally updated; EPG content is not ingested
        if playlist.is_local() || playlist.source == DataSource::Epg {
            debug!(url = %url, source = %playlist.source, "Refresh is a no-op");
            return once(Process::success());
        }

        self.start(playlist, strategy)
    }

    /// Cancel any in-flight run, then delete the playlist and its channels
    pub async fn unsubscribe(&self, url: &str) -> Result<Option<Playlist>, SyncError> {
        if let Some(mut progress) = self.inner.registry.cancel(url) {
            // Wait for the run to stop writing before deleting
            while !progress.borrow_and_update().is_terminal() {
                if progress.changed().await.is_err() {
                    break;
                }
            }
        }

        let removed = self.inner.store.delete_playlist(url).await?;
        if removed.is_some() {
            info!(url = %url, "Playlist unsubscribed");
        }
        Ok(removed)
    }

    /// Cooperatively cancel the in-flight run for `url`
    pub fn cancel(&self, url: &str) -> bool {
        let cancelled = self.inner.registry.cancel(url).is_some();
        if cancelled {
            info!(url = %url, "Sync cancellation requested");
        }
        cancelled
    }

    pub async fn link_epg(&self, playlist_url: &str, epg_url: &str) -> Result<Playlist, SyncError> {
        let mut playlist = self.require_playlist(playlist_url).await?;
        if !playlist.epg_urls.iter().any(|u| u == epg_url) {
            playlist.epg_urls.push(epg_url.to_string());
            self.inner.store.upsert_playlist(&playlist).await?;
        }
        Ok(playlist)
    }

    pub async fn unlink_epg(&self, playlist_url: &str, epg_url: &str) -> Result<Playlist, SyncError> {
        let mut playlist = self.require_playlist(playlist_url).await?;
        let before = playlist.epg_urls.len();
        playlist.epg_urls.retain(|u| u != epg_url);
        if playlist.epg_urls.len() != before {
            self.inner.store.upsert_playlist(&playlist).await?;
        }
        Ok(playlist)
    }

    /// Set user-owned state on one channel
    pub async fn update_channel(&self, id: &str, patch: &ChannelPatch) -> Result<Channel, SyncError> {
        self.inner
            .store
            .update_channel_state(id, patch)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("channel {}", id)))
    }

    pub async fn playlists(&self) -> Result<Vec<Playlist>, SyncError> {
        Ok(self.inner.store.list_playlists().await?)
    }

    pub async fn channels(&self, playlist_url: &str) -> Result<Vec<Channel>, SyncError> {
        Ok(self.inner.store.channels_by_playlist(playlist_url).await?)
    }

    async fn require_playlist(&self, url: &str) -> Result<Playlist, SyncError> {
        self.inner
            .store
            .get_playlist(url)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("playlist {}", url)))
    }

    // ========================================================================
    // Runs
    // ========================================================================

    /// Start a run for `playlist`, or join the one already in flight
    fn start(&self, playlist: Playlist, strategy: SyncStrategy) -> ProgressStream {
        match self.inner.registry.admit(&playlist.url) {
            Admission::Joined(progress) => {
                debug!(url = %playlist.url, "Joining in-flight sync");
                Box::pin(progress_stream(progress))
            }
            Admission::Started(ticket) => {
                let progress = ticket.subscribe();
                let engine = self.clone();
                tokio::spawn(async move { engine.run(playlist, strategy, ticket).await });
                Box::pin(progress_stream(progress))
            }
        }
    }

    async fn run(&self, playlist: Playlist, strategy: SyncStrategy, ticket: SyncTicket) {
        let started = Instant::now();
        metrics::sync_started();
        info!(url = %playlist.url, source = %playlist.source, strategy = %strategy, "Sync started");

        let result = self.execute(&playlist, strategy, &ticket).await;
        let elapsed = started.elapsed();

        let terminal = match result {
            Ok(summary) => {
                metrics::sync_finished(Outcome::Success, elapsed);
                info!(
                    url = %playlist.url,
                    received = summary.received,
                    dropped = summary.dropped,
                    upserted = summary.upserted,
                    deleted = summary.deleted,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Sync completed"
                );
                Process::success()
            }
            Err(e) if e.is_cancelled() => {
                metrics::sync_finished(Outcome::Cancelled, elapsed);
                warn!(url = %playlist.url, "Sync cancelled");
                Process::failure(e.to_string())
            }
            Err(e) => {
                metrics::sync_finished(Outcome::Failure, elapsed);
                error!(url = %playlist.url, error = %e, "Sync failed");
                Process::failure(e.to_string())
            }
        };

        ticket.complete(terminal);
    }

    async fn execute(
        &self,
        playlist: &Playlist,
        strategy: SyncStrategy,
        ticket: &SyncTicket,
    ) -> Result<SyncSummary, SyncError> {
        let store = self.inner.store.clone();
        let config = &self.inner.config;
        let cancel = ticket.cancel_token();

        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            &playlist.url,
            strategy,
            config.reconcile_mode,
        ));
        let accumulator = Accumulator::new(config.batch_size, {
            let reconciler = reconciler.clone();
            move |batch: Vec<Channel>| {
                let reconciler = reconciler.clone();
                async move { reconciler.apply_batch(batch).await }
            }
        });
        let ctx = NormalizationContext::new(&playlist.url);

        let mut entries = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            opened = source::open(&self.inner.http, config, playlist) => opened?,
        };

        let mut summary = SyncSummary::default();
        let mut reported = 0;

        let streamed: Result<(), SyncError> = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(SyncError::Cancelled),
                next = entries.next() => next,
            };

            let entry = match next {
                None => break Ok(()),
                Some(Err(e)) => break Err(e),
                Some(Ok(entry)) => entry,
            };

            summary.received += 1;
            match normalize(entry, &ctx) {
                Some(channel) => {
                    if let Err(e) = accumulator.push(channel).await {
                        break Err(e.into());
                    }
                }
                None => summary.dropped += 1,
            }

            let processed = reconciler.processed();
            if processed != reported {
                reported = processed;
                ticket.report(Process::Loading { committed: processed });
            }

            if summary.received % PROGRESS_LOG_EVERY == 0 {
                info!(url = %playlist.url, received = summary.received, committed = processed, "Sync progress");
            }
        };

        // Stop network reads before touching storage again
        drop(entries);
        metrics::entries_dropped(summary.dropped);

        match streamed {
            Ok(()) => {
                accumulator.flush().await?;
                let outcome = reconciler.finish(true).await?;
                store.mark_synced(&playlist.url, now_millis()).await?;

                summary.upserted = outcome.upserted;
                summary.deleted = outcome.deleted;
                metrics::channels_upserted(outcome.upserted);
                metrics::channels_deleted(outcome.deleted);
                Ok(summary)
            }
            Err(SyncError::Store(e)) => {
                // Remaining batches are abandoned; committed ones stay
                let discarded = accumulator.discard();
                debug!(url = %playlist.url, discarded, "Abandoning unflushed channels after storage failure");
                metrics::channels_upserted(reconciler.processed());
                Err(SyncError::Store(e))
            }
            Err(e) => {
                // Keep partial progress, skip the stale delete
                let kept = match accumulator.flush().await {
                    Ok(()) => reconciler.finish(false).await,
                    Err(flush_err) => Err(flush_err),
                };
                match kept {
                    Ok(outcome) => {
                        metrics::channels_upserted(outcome.upserted);
                        debug!(url = %playlist.url, kept = outcome.upserted, "Partial progress committed");
                    }
                    Err(store_err) => {
                        warn!(url = %playlist.url, error = %store_err, "Failed to commit partial progress");
                    }
                }
                Err(e)
            }
        }
    }

    /// Refresh every remote playlist with its stored strategy, one at a time.
    /// Returns `(succeeded, failed)`.
    pub async fn refresh_all(&self) -> Result<(usize, usize), SyncError> {
        let playlists = self.inner.store.list_playlists().await?;
        let mut succeeded = 0;
        let mut failed = 0;

        for playlist in playlists {
            if playlist.is_local() || playlist.source == DataSource::Epg {
                continue;
            }

            let mut progress = self.refresh(&playlist.url, playlist.strategy).await;
            let mut last = None;
            while let Some(process) = progress.next().await {
                last = Some(process);
            }

            match last {
                Some(Process::Success { .. }) => succeeded += 1,
                Some(Process::Failure { message }) => {
                    warn!(url = %playlist.url, error = %message, "Scheduled refresh failed");
                    failed += 1;
                }
                _ => failed += 1,
            }
        }

        Ok((succeeded, failed))
    }
}

#[cfg(test)]
mod tests;
