//! PostgreSQL implementation of [`PlaylistStore`]

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::debug;

use super::repository::{channels, playlists};
use crate::models::{Channel, ChannelPatch, Playlist};
use crate::store::{PlaylistStore, StoreError};

/// Rows per UNNEST statement inside a deferred commit
const COMMIT_CHUNK: usize = 5_000;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn keep_list(keep: &HashSet<String>) -> Vec<String> {
    keep.iter().cloned().collect()
}

#[async_trait]
impl PlaylistStore for PgStore {
    async fn upsert_playlist(&self, playlist: &Playlist) -> Result<(), StoreError> {
        playlists::upsert(&self.pool, playlist).await?;
        Ok(())
    }

    async fn get_playlist(&self, url: &str) -> Result<Option<Playlist>, StoreError> {
        playlists::find_by_url(&self.pool, url)
            .await?
            .map(Playlist::try_from)
            .transpose()
    }

    async fn list_playlists(&self) -> Result<Vec<Playlist>, StoreError> {
        playlists::list_all(&self.pool)
            .await?
            .into_iter()
            .map(Playlist::try_from)
            .collect()
    }

    async fn delete_playlist(&self, url: &str) -> Result<Option<Playlist>, StoreError> {
        playlists::delete_by_url(&self.pool, url)
            .await?
            .map(Playlist::try_from)
            .transpose()
    }

    async fn mark_synced(&self, url: &str, synced_at: i64) -> Result<(), StoreError> {
        playlists::mark_synced(&self.pool, url, synced_at).await?;
        Ok(())
    }

    async fn upsert_channels(&self, batch: &[Channel]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let written = channels::upsert_batch(&mut *tx, batch).await?;
        tx.commit().await?;
        Ok(written)
    }

    async fn delete_channels_not_in(
        &self,
        playlist_url: &str,
        keep: &HashSet<String>,
    ) -> Result<u64, StoreError> {
        let deleted = channels::delete_not_in(&self.pool, playlist_url, &keep_list(keep)).await?;
        Ok(deleted)
    }

    async fn channels_by_playlist(&self, playlist_url: &str) -> Result<Vec<Channel>, StoreError> {
        let rows = channels::find_by_playlist(&self.pool, playlist_url).await?;
        Ok(rows.into_iter().map(Channel::from).collect())
    }

    async fn update_channel_state(
        &self,
        id: &str,
        patch: &ChannelPatch,
    ) -> Result<Option<Channel>, StoreError> {
        let row = channels::update_state(&self.pool, id, patch).await?;
        Ok(row.map(Channel::from))
    }

    /// Single transaction: either every upsert and the stale delete land, or
    /// nothing does
    async fn commit_channels(
        &self,
        playlist_url: &str,
        batch: &[Channel],
        keep: Option<&HashSet<String>>,
    ) -> Result<(usize, u64), StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut upserted = 0;
        for chunk in batch.chunks(COMMIT_CHUNK) {
            upserted += channels::upsert_batch(&mut *tx, chunk).await?;
        }

        let deleted = match keep {
            Some(keep) => channels::delete_not_in(&mut *tx, playlist_url, &keep_list(keep)).await?,
            None => 0,
        };

        tx.commit().await?;
        debug!(playlist_url = %playlist_url, upserted, deleted, "Committed staged channels");
        Ok((upserted, deleted))
    }
}
