//! Persistence gateway
//!
//! The sync engine talks to storage only through [`PlaylistStore`]. Channel
//! upserts are keyed by `(playlist_url, url)`: an existing row gets its
//! upstream-owned fields (`title`, `category`, `cover`, `relation_id`)
//! overwritten and keeps `favourite`, `hidden` and `seen`; a new row starts
//! with the defaults.

pub mod memory;

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

use crate::models::{Channel, ChannelPatch, Playlist};

pub use memory::InMemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid stored value for '{field}': {value}")]
    Corrupt { field: &'static str, value: String },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Insert or fully replace a playlist row
    async fn upsert_playlist(&self, playlist: &Playlist) -> Result<(), StoreError>;
    async fn get_playlist(&self, url: &str) -> Result<Option<Playlist>, StoreError>;
    async fn list_playlists(&self) -> Result<Vec<Playlist>, StoreError>;
    /// Delete a playlist and all of its channels, returning the removed row
    async fn delete_playlist(&self, url: &str) -> Result<Option<Playlist>, StoreError>;
    /// Record the completion time (epoch millis) of a successful sync
    async fn mark_synced(&self, url: &str, synced_at: i64) -> Result<(), StoreError>;

    /// Upsert a batch in one transaction. Later entries win for duplicate keys.
    async fn upsert_channels(&self, channels: &[Channel]) -> Result<usize, StoreError>;

    async fn upsert_channel(&self, channel: &Channel) -> Result<(), StoreError> {
        self.upsert_channels(std::slice::from_ref(channel)).await?;
        Ok(())
    }

    /// Delete every channel of `playlist_url` whose URL is not in `keep`
    async fn delete_channels_not_in(
        &self,
        playlist_url: &str,
        keep: &HashSet<String>,
    ) -> Result<u64, StoreError>;

    async fn channels_by_playlist(&self, playlist_url: &str) -> Result<Vec<Channel>, StoreError>;

    /// Apply user-owned state; `None` if no channel has this id
    async fn update_channel_state(
        &self,
        id: &str,
        patch: &ChannelPatch,
    ) -> Result<Option<Channel>, StoreError>;

    /// Upsert `channels` and, when `keep` is given, delete stale rows, as one
    /// unit of work. Returns `(upserted, deleted)`.
    async fn commit_channels(
        &self,
        playlist_url: &str,
        channels: &[Channel],
        keep: Option<&HashSet<String>>,
    ) -> Result<(usize, u64), StoreError> {
        let upserted = self.upsert_channels(channels).await?;
        let deleted = match keep {
            Some(keep) => self.delete_channels_not_in(playlist_url, keep).await?,
            None => 0,
        };
        Ok((upserted, deleted))
    }
}
