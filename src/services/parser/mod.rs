//! Entry parsers
//!
//! Format-specific readers that turn upstream bytes into an ordered, single-pass
//! sequence of [`ParsedEntry`] values:
//!
//! - [`m3u`]: line-oriented `#EXTM3U` state machine
//! - [`xtream`]: mapper from Xtream Player API JSON collections
//!
//! Both honour the same [`ParseMode`]: lenient parsers skip malformed entries
//! and keep going, strict parsers stop at the first malformed entry with a
//! [`ParseError`].

pub mod m3u;
pub mod xtream;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use m3u::{parse_m3u_stream, M3uParser};
pub use xtream::{XtreamKind, XtreamMapper};

/// Transient parse result, consumed immediately by the normalizer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedEntry {
    /// Upstream identifier (`tvg-id`, Xtream stream id)
    pub id: String,
    /// Upstream display name (`tvg-name`)
    pub name: String,
    pub title: String,
    pub group: String,
    pub cover: String,
    pub url: String,
    /// Seconds, -1 for live/unknown
    pub duration: f64,
}

/// How malformed input is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Skip the offending entry and continue
    #[default]
    Lenient,
    /// Abort the sequence with a typed error
    Strict,
}

impl ParseMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Some(ParseMode::Lenient),
            "strict" => Some(ParseMode::Strict),
            _ => None,
        }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, ParseMode::Strict)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("line {line}: stream URL has no recognizable scheme: {fragment}")]
    InvalidUrl { line: usize, fragment: String },

    #[error("line {line}: entry has no stream URL: {fragment}")]
    MissingUrl { line: usize, fragment: String },

    #[error("line {line}: entry found before #EXTM3U header")]
    MissingHeader { line: usize },

    #[error("line {line}: exceeds max length of {max} bytes")]
    LineTooLong { line: usize, max: usize },

    #[error("invalid JSON in {collection}: {message} (near: {fragment})")]
    Json {
        collection: String,
        message: String,
        fragment: String,
    },
}

/// Failure while pulling entries off a byte stream
#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("no data received for {0:?}")]
    Timeout(Duration),
}

/// Truncate an offending fragment for error messages
pub(crate) fn fragment(text: &str) -> String {
    const MAX: usize = 120;
    if text.len() <= MAX {
        return text.to_string();
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// A stream URL must carry a scheme (`http:`, `rtmp:`, `udp:`...).
/// Single-letter schemes are Windows drive letters, not schemes.
pub(crate) fn has_scheme(url: &str) -> bool {
    url::Url::parse(url)
        .map(|parsed| parsed.scheme().len() > 1)
        .unwrap_or(false)
}
