use serde::{Deserialize, Serialize};

use crate::services::xtream::XtreamCredentials;

/// Where a playlist's channels come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    M3u,
    Xtream,
    Epg,
    #[serde(rename = "local")]
    LocalFile,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::M3u => "m3u",
            DataSource::Xtream => "xtream",
            DataSource::Epg => "epg",
            DataSource::LocalFile => "local",
        }
    }

    /// Parse the stored column value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "m3u" => Some(DataSource::M3u),
            "xtream" => Some(DataSource::Xtream),
            "epg" => Some(DataSource::Epg),
            "local" => Some(DataSource::LocalFile),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciliation policy applied when a playlist is synced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Post-sync channel set equals the freshly parsed set
    #[default]
    All,
    /// Upsert only, stale channels are kept
    Keep,
}

impl SyncStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStrategy::All => "all",
            SyncStrategy::Keep => "keep",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Some(SyncStrategy::All),
            "keep" => Some(SyncStrategy::Keep),
            _ => None,
        }
    }

    pub fn deletes_stale(&self) -> bool {
        matches!(self, SyncStrategy::All)
    }
}

impl std::fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscribed playlist, identified by its URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub url: String,
    pub title: String,
    pub source: DataSource,
    pub strategy: SyncStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip)]
    pub credentials: Option<XtreamCredentials>,
    #[serde(default)]
    pub epg_urls: Vec<String>,
    /// Epoch millis of the last fully successful sync
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<i64>,
}

impl Playlist {
    pub fn new(title: &str, url: &str, source: DataSource, strategy: SyncStrategy) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            source,
            strategy,
            user_agent: None,
            credentials: None,
            epg_urls: Vec::new(),
            synced_at: None,
        }
    }

    /// Local playlists are never refreshed from upstream
    pub fn is_local(&self) -> bool {
        self.source == DataSource::LocalFile
    }

    /// Apply the mutable attributes of a re-subscription, keeping sync state
    pub fn merge_resubscribe(&mut self, incoming: Playlist) {
        self.title = incoming.title;
        self.strategy = incoming.strategy;
        self.source = incoming.source;
        if incoming.credentials.is_some() {
            self.credentials = incoming.credentials;
        }
        if incoming.user_agent.is_some() {
            self.user_agent = incoming.user_agent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!(SyncStrategy::parse("ALL"), Some(SyncStrategy::All));
        assert_eq!(SyncStrategy::parse("keep"), Some(SyncStrategy::Keep));
        assert_eq!(SyncStrategy::parse("merge"), None);
        assert!(SyncStrategy::All.deletes_stale());
        assert!(!SyncStrategy::Keep.deletes_stale());
    }

    #[test]
    fn test_data_source_round_trip_names() {
        for source in [DataSource::M3u, DataSource::Xtream, DataSource::Epg, DataSource::LocalFile] {
            assert_eq!(DataSource::parse(source.as_str()), Some(source));
        }
    }

    #[test]
    fn test_merge_resubscribe_keeps_sync_state() {
        let mut existing = Playlist::new("Old", "http://x/p.m3u", DataSource::M3u, SyncStrategy::All);
        existing.synced_at = Some(42);
        existing.epg_urls.push("http://x/epg.xml".to_string());

        let incoming = Playlist::new("New", "http://x/p.m3u", DataSource::M3u, SyncStrategy::Keep);
        existing.merge_resubscribe(incoming);

        assert_eq!(existing.title, "New");
        assert_eq!(existing.strategy, SyncStrategy::Keep);
        assert_eq!(existing.synced_at, Some(42));
        assert_eq!(existing.epg_urls.len(), 1);
    }
}
