//! Entry normalizer
//!
//! Pure mapping from a format-specific [`ParsedEntry`] to a canonical
//! [`Channel`]. User-owned fields always come out at their defaults; the
//! store carries existing values forward on upsert.

use crate::models::Channel;
use crate::services::parser::ParsedEntry;

/// Source-specific context for normalization
#[derive(Debug, Clone)]
pub struct NormalizationContext {
    pub playlist_url: String,
}

impl NormalizationContext {
    pub fn new(playlist_url: &str) -> Self {
        Self {
            playlist_url: playlist_url.to_string(),
        }
    }
}

/// Normalize one entry. Entries with an empty URL are dropped.
pub fn normalize(entry: ParsedEntry, ctx: &NormalizationContext) -> Option<Channel> {
    let url = entry.url.trim();
    if url.is_empty() {
        return None;
    }

    let mut channel = Channel::new(
        &ctx.playlist_url,
        url,
        entry.title.trim(),
        entry.group.trim(),
    );
    channel.cover = non_empty(entry.cover);
    channel.relation_id = non_empty(entry.id);

    Some(channel)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::parser::{M3uParser, ParseMode};

    #[test]
    fn test_normalize_scenario() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-logo=\"http://x/a.png\" group-title=\"Sports\",ESPN\nhttp://x/espn.m3u8\n";
        let entries = M3uParser::parse_str(text, ParseMode::Lenient).unwrap();
        let ctx = NormalizationContext::new("p1");

        let channels: Vec<Channel> = entries
            .into_iter()
            .filter_map(|e| normalize(e, &ctx))
            .collect();

        assert_eq!(channels.len(), 1);
        let channel = &channels[0];
        assert_eq!(channel.playlist_url, "p1");
        assert_eq!(channel.url, "http://x/espn.m3u8");
        assert_eq!(channel.title, "ESPN");
        assert_eq!(channel.category, "Sports");
        assert_eq!(channel.cover.as_deref(), Some("http://x/a.png"));
        assert!(!channel.favourite);
        assert!(!channel.hidden);
        assert_eq!(channel.seen, 0);
    }

    #[test]
    fn test_empty_url_dropped() {
        let ctx = NormalizationContext::new("p1");
        let entry = ParsedEntry {
            title: "No URL".to_string(),
            url: "  ".to_string(),
            ..Default::default()
        };
        assert!(normalize(entry, &ctx).is_none());
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let ctx = NormalizationContext::new("p1");
        let entry = ParsedEntry {
            title: "  Padded  ".to_string(),
            url: "http://x/a".to_string(),
            cover: "".to_string(),
            id: "a.id".to_string(),
            ..Default::default()
        };

        let channel = normalize(entry, &ctx).unwrap();
        assert_eq!(channel.title, "Padded");
        assert_eq!(channel.category, "");
        assert_eq!(channel.cover, None);
        assert_eq!(channel.relation_id.as_deref(), Some("a.id"));
        assert_eq!(channel.id, crate::models::channel_id("p1", "http://x/a"));
    }
}
