//! Database row types for PostgreSQL
//!
//! These types map directly to database rows and convert into the domain
//! types in `models/`.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::models::{Channel, DataSource, Playlist, SyncStrategy};
use crate::services::xtream::XtreamCredentials;
use crate::store::StoreError;

/// Column list shared by every playlist query
pub const PLAYLIST_COLUMNS: &str = "url, title, source, strategy, user_agent, xtream_server, \
     xtream_username, xtream_password, epg_urls, synced_at, created_at, updated_at";

/// Column list shared by every channel query
pub const CHANNEL_COLUMNS: &str =
    "id, playlist_url, url, title, category, cover, relation_id, favourite, hidden, seen";

/// Playlist row from database
#[derive(Debug, Clone, FromRow)]
pub struct PlaylistRow {
    pub url: String,
    pub title: String,
    pub source: String,
    pub strategy: String,
    pub user_agent: Option<String>,
    pub xtream_server: Option<String>,
    pub xtream_username: Option<String>,
    pub xtream_password: Option<String>,
    pub epg_urls: Vec<String>,
    pub synced_at: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PlaylistRow> for Playlist {
    type Error = StoreError;

    fn try_from(row: PlaylistRow) -> Result<Self, Self::Error> {
        let source = DataSource::parse(&row.source).ok_or_else(|| StoreError::Corrupt {
            field: "source",
            value: row.source.clone(),
        })?;
        let strategy = SyncStrategy::parse(&row.strategy).ok_or_else(|| StoreError::Corrupt {
            field: "strategy",
            value: row.strategy.clone(),
        })?;

        let credentials = match (row.xtream_server, row.xtream_username, row.xtream_password) {
            (Some(server), Some(username), Some(password)) => {
                Some(XtreamCredentials::new(&server, &username, &password))
            }
            _ => None,
        };

        Ok(Playlist {
            url: row.url,
            title: row.title,
            source,
            strategy,
            user_agent: row.user_agent,
            credentials,
            epg_urls: row.epg_urls,
            synced_at: row.synced_at,
        })
    }
}

/// Channel row from database
#[derive(Debug, Clone, FromRow)]
pub struct ChannelRow {
    pub id: String,
    pub playlist_url: String,
    pub url: String,
    pub title: String,
    pub category: String,
    pub cover: Option<String>,
    pub relation_id: Option<String>,
    pub favourite: bool,
    pub hidden: bool,
    pub seen: i64,
}

impl From<ChannelRow> for Channel {
    fn from(row: ChannelRow) -> Self {
        Channel {
            id: row.id,
            playlist_url: row.playlist_url,
            url: row.url,
            title: row.title,
            category: row.category,
            cover: row.cover,
            relation_id: row.relation_id,
            favourite: row.favourite,
            hidden: row.hidden,
            seen: row.seen,
        }
    }
}

// ============================================================================
// Batch Write Types
// ============================================================================

/// Column-oriented form of a channel batch, bound as `UNNEST` arrays
#[derive(Debug, Default)]
pub struct ChannelColumns {
    pub ids: Vec<String>,
    pub playlist_urls: Vec<String>,
    pub urls: Vec<String>,
    pub titles: Vec<String>,
    pub categories: Vec<String>,
    pub covers: Vec<Option<String>>,
    pub relation_ids: Vec<Option<String>>,
}

impl ChannelColumns {
    pub fn from_channels(channels: &[Channel]) -> Self {
        let mut columns = Self {
            ids: Vec::with_capacity(channels.len()),
            playlist_urls: Vec::with_capacity(channels.len()),
            urls: Vec::with_capacity(channels.len()),
            titles: Vec::with_capacity(channels.len()),
            categories: Vec::with_capacity(channels.len()),
            covers: Vec::with_capacity(channels.len()),
            relation_ids: Vec::with_capacity(channels.len()),
        };

        for channel in channels {
            columns.ids.push(channel.id.clone());
            columns.playlist_urls.push(channel.playlist_url.clone());
            columns.urls.push(channel.url.clone());
            columns.titles.push(channel.title.clone());
            columns.categories.push(channel.category.clone());
            columns.covers.push(channel.cover.clone());
            columns.relation_ids.push(channel.relation_id.clone());
        }

        columns
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
