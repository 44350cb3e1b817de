use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Generate SHA1 hash of a string (hex encoded)
pub fn hash_key(value: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Synthetic primary key for the `(playlist_url, url)` pair
pub fn channel_id(playlist_url: &str, url: &str) -> String {
    hash_key(&format!("{}\n{}", playlist_url, url))
}

/// A playable stream entry belonging to one playlist
///
/// `title`, `category`, `cover` and `relation_id` come from upstream and are
/// overwritten on every sync. `favourite`, `hidden` and `seen` belong to the
/// user and survive syncs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub playlist_url: String,
    pub url: String,
    pub title: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_id: Option<String>,
    pub favourite: bool,
    pub hidden: bool,
    /// Epoch millis of last playback, 0 = never played
    pub seen: i64,
}

impl Channel {
    /// New channel with default user-owned state
    pub fn new(playlist_url: &str, url: &str, title: &str, category: &str) -> Self {
        Self {
            id: channel_id(playlist_url, url),
            playlist_url: playlist_url.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            category: category.to_string(),
            cover: None,
            relation_id: None,
            favourite: false,
            hidden: false,
            seen: 0,
        }
    }

    /// Overwrite the upstream-owned fields from a freshly parsed channel
    pub fn refresh_from(&mut self, fresh: &Channel) {
        self.title = fresh.title.clone();
        self.category = fresh.category.clone();
        self.cover = fresh.cover.clone();
        self.relation_id = fresh.relation_id.clone();
    }

    pub fn apply_patch(&mut self, patch: &ChannelPatch) {
        if let Some(favourite) = patch.favourite {
            self.favourite = favourite;
        }
        if let Some(hidden) = patch.hidden {
            self.hidden = hidden;
        }
        if let Some(seen) = patch.seen {
            self.seen = seen;
        }
    }
}

/// Update of user-owned channel state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPatch {
    #[serde(default)]
    pub favourite: Option<bool>,
    #[serde(default)]
    pub hidden: Option<bool>,
    #[serde(default)]
    pub seen: Option<i64>,
}

impl ChannelPatch {
    pub fn is_empty(&self) -> bool {
        self.favourite.is_none() && self.hidden.is_none() && self.seen.is_none()
    }
}

/// Collapse duplicate keys within one batch, keeping the last occurrence.
/// Order of first appearance is preserved.
pub fn dedup_last_wins(channels: &[Channel]) -> Vec<Channel> {
    let mut index: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    let mut out: Vec<Channel> = Vec::with_capacity(channels.len());

    for channel in channels {
        match index.get(channel.id.as_str()) {
            Some(&pos) => out[pos] = channel.clone(),
            None => {
                index.insert(channel.id.as_str(), out.len());
                out.push(channel.clone());
            }
        }
    }

    out
}
