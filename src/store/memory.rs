use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{PlaylistStore, StoreError};
use crate::models::{dedup_last_wins, Channel, ChannelPatch, Playlist};

#[derive(Default)]
struct Tables {
    playlists: HashMap<String, Playlist>,
    /// Channels by id, with an insertion sequence for stable listing order
    channels: HashMap<String, (u64, Channel)>,
    next_seq: u64,
}

/// Process-local store, used by tests and database-less runs
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    channel_writes: AtomicUsize,
    /// Channel writes allowed before writes start failing
    fail_after: AtomicUsize,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            channel_writes: AtomicUsize::new(0),
            fail_after: AtomicUsize::new(usize::MAX),
        }
    }

    /// Number of channel write operations performed so far
    pub fn channel_writes(&self) -> usize {
        self.channel_writes.load(Ordering::SeqCst)
    }

    /// Make every channel write after the first `writes` fail
    pub fn fail_channel_writes_after(&self, writes: usize) {
        self.fail_after.store(writes, Ordering::SeqCst);
    }

    fn begin_channel_write(&self) -> Result<(), StoreError> {
        let done = self.channel_writes.fetch_add(1, Ordering::SeqCst);
        if done >= self.fail_after.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn upsert_locked(tables: &mut Tables, channels: &[Channel]) -> usize {
    let batch = dedup_last_wins(channels);
    for fresh in &batch {
        match tables.channels.get_mut(&fresh.id) {
            Some((_, existing)) => existing.refresh_from(fresh),
            None => {
                let seq = tables.next_seq;
                tables.next_seq += 1;
                let mut channel = fresh.clone();
                channel.favourite = false;
                channel.hidden = false;
                channel.seen = 0;
                tables.channels.insert(fresh.id.clone(), (seq, channel));
            }
        }
    }
    batch.len()
}

fn delete_locked(tables: &mut Tables, playlist_url: &str, keep: &HashSet<String>) -> u64 {
    let before = tables.channels.len();
    tables
        .channels
        .retain(|_, (_, c)| c.playlist_url != playlist_url || keep.contains(&c.url));
    (before - tables.channels.len()) as u64
}

#[async_trait]
impl PlaylistStore for InMemoryStore {
    async fn upsert_playlist(&self, playlist: &Playlist) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .playlists
            .insert(playlist.url.clone(), playlist.clone());
        Ok(())
    }

    async fn get_playlist(&self, url: &str) -> Result<Option<Playlist>, StoreError> {
        Ok(self.tables.read().await.playlists.get(url).cloned())
    }

    async fn list_playlists(&self) -> Result<Vec<Playlist>, StoreError> {
        let tables = self.tables.read().await;
        let mut playlists: Vec<Playlist> = tables.playlists.values().cloned().collect();
        playlists.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.url.cmp(&b.url)));
        Ok(playlists)
    }

    async fn delete_playlist(&self, url: &str) -> Result<Option<Playlist>, StoreError> {
        let mut tables = self.tables.write().await;
        let removed = tables.playlists.remove(url);
        if removed.is_some() {
            tables.channels.retain(|_, (_, c)| c.playlist_url != url);
        }
        Ok(removed)
    }

    async fn mark_synced(&self, url: &str, synced_at: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(playlist) = tables.playlists.get_mut(url) {
            playlist.synced_at = Some(synced_at);
        }
        Ok(())
    }

    async fn upsert_channels(&self, channels: &[Channel]) -> Result<usize, StoreError> {
        self.begin_channel_write()?;
        let mut tables = self.tables.write().await;
        Ok(upsert_locked(&mut tables, channels))
    }

    async fn delete_channels_not_in(
        &self,
        playlist_url: &str,
        keep: &HashSet<String>,
    ) -> Result<u64, StoreError> {
        self.begin_channel_write()?;
        let mut tables = self.tables.write().await;
        Ok(delete_locked(&mut tables, playlist_url, keep))
    }

    async fn channels_by_playlist(&self, playlist_url: &str) -> Result<Vec<Channel>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&(u64, Channel)> = tables
            .channels
            .values()
            .filter(|(_, c)| c.playlist_url == playlist_url)
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, c)| c.clone()).collect())
    }

    async fn update_channel_state(
        &self,
        id: &str,
        patch: &ChannelPatch,
    ) -> Result<Option<Channel>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.channels.get_mut(id).map(|(_, channel)| {
            channel.apply_patch(patch);
            channel.clone()
        }))
    }

    async fn commit_channels(
        &self,
        playlist_url: &str,
        channels: &[Channel],
        keep: Option<&HashSet<String>>,
    ) -> Result<(usize, u64), StoreError> {
        self.begin_channel_write()?;
        let mut tables = self.tables.write().await;
        let upserted = upsert_locked(&mut tables, channels);
        let deleted = keep
            .map(|keep| delete_locked(&mut tables, playlist_url, keep))
            .unwrap_or(0);
        Ok((upserted, deleted))
    }
}
