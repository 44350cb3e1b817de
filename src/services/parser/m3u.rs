//! M3U playlist parser
//!
//! Line-oriented state machine over `#EXTM3U` / `#EXTINF:` playlists.
//! Format: `#EXTINF:duration tvg-id="..." tvg-name="..." tvg-logo="..." group-title="...",Title`
//! followed by the stream URL on its own line.

use async_stream::stream;
use futures::Stream;
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use super::{fragment, has_scheme, ParseError, ParseMode, ParsedEntry, ReadError};

const HEADER_MARK: &str = "#EXTM3U";
const INFO_MARK: &str = "#EXTINF:";
const BOM: char = '\u{feff}';

// Defensive limits for streamed parsing
pub const MAX_LINE_BYTES: usize = 32 * 1024; // protect against maliciously long lines

lazy_static! {
    /// Leading EXTINF duration (`-1`, `0`, `123.5`)
    static ref DURATION_REGEX: Regex = Regex::new(r"^[+-]?\d+(?:\.\d+)?").unwrap();
}

#[derive(Debug)]
enum State {
    AwaitingHeader,
    AwaitingInfo,
    HaveInfo(ParsedEntry),
}

/// Incremental M3U parser. Feed it lines in order; completed entries come out
/// as soon as their URL line is seen.
#[derive(Debug)]
pub struct M3uParser {
    state: State,
    mode: ParseMode,
    line_no: usize,
    seen_header: bool,
    dropped: usize,
}

impl M3uParser {
    pub fn new(mode: ParseMode) -> Self {
        Self {
            state: State::AwaitingHeader,
            mode,
            line_no: 0,
            seen_header: false,
            dropped: 0,
        }
    }

    /// Parse a whole in-memory playlist
    pub fn parse_str(text: &str, mode: ParseMode) -> Result<Vec<ParsedEntry>, ParseError> {
        let mut parser = Self::new(mode);
        let mut entries = Vec::new();
        for line in text.lines() {
            if let Some(entry) = parser.feed_line(line)? {
                entries.push(entry);
            }
        }
        parser.finish()?;
        Ok(entries)
    }

    /// Number of entries dropped so far (lenient mode only)
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Number of lines consumed so far
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Feed one line. Returns the entry this line completed, if any.
    pub fn feed_line(&mut self, raw: &str) -> Result<Option<ParsedEntry>, ParseError> {
        self.line_no += 1;
        let raw = if self.line_no == 1 { raw.trim_start_matches(BOM) } else { raw };
        let line = raw.trim();

        if line.is_empty() {
            return Ok(None);
        }

        if line.starts_with(HEADER_MARK) {
            if let State::HaveInfo(pending) = &self.state {
                debug!(line = self.line_no, title = %pending.title, "Discarding entry before #EXTM3U header");
            }
            self.seen_header = true;
            self.state = State::AwaitingInfo;
            return Ok(None);
        }

        if line.starts_with(INFO_MARK) {
            self.flush_pending()?;
            self.state = State::HaveInfo(parse_extinf(line));
            return Ok(None);
        }

        // Any other directive is a comment
        if line.starts_with('#') {
            return Ok(None);
        }

        let state = std::mem::replace(&mut self.state, State::AwaitingInfo);
        let mut entry = match state {
            State::HaveInfo(entry) => entry,
            other => {
                // URL without a preceding #EXTINF
                self.state = other;
                return Ok(None);
            }
        };

        if !self.seen_header && self.mode.is_strict() {
            return Err(ParseError::MissingHeader { line: self.line_no });
        }

        if !has_scheme(line) {
            if self.mode.is_strict() {
                return Err(ParseError::InvalidUrl {
                    line: self.line_no,
                    fragment: fragment(line),
                });
            }
            self.dropped += 1;
            debug!(line = self.line_no, url = %fragment(line), "Dropping entry with invalid URL");
            return Ok(None);
        }

        entry.url = line.to_string();
        Ok(Some(entry))
    }

    /// Signal end of input
    pub fn finish(&mut self) -> Result<(), ParseError> {
        self.flush_pending()?;
        self.state = State::AwaitingInfo;
        Ok(())
    }

    /// A pending entry is only ever flushed without its URL line, so it is
    /// invalid and never emitted.
    fn flush_pending(&mut self) -> Result<(), ParseError> {
        if let State::HaveInfo(pending) = std::mem::replace(&mut self.state, State::AwaitingInfo) {
            if self.mode.is_strict() {
                return Err(ParseError::MissingUrl {
                    line: self.line_no,
                    fragment: fragment(&pending.title),
                });
            }
            self.dropped += 1;
            debug!(line = self.line_no, title = %pending.title, "Dropping entry without URL");
        }
        Ok(())
    }
}

/// Parse an `#EXTINF:` line into a pending entry (URL still empty)
fn parse_extinf(line: &str) -> ParsedEntry {
    let decoded = match urlencoding::decode(line) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => line.to_string(),
    };

    let body = decoded.strip_prefix(INFO_MARK).unwrap_or(&decoded).trim_start();

    let mut entry = ParsedEntry {
        duration: -1.0,
        ..Default::default()
    };

    let mut pos = 0;
    if let Some(m) = DURATION_REGEX.find(body) {
        entry.duration = m.as_str().parse().unwrap_or(-1.0);
        pos = m.end();
    }

    loop {
        pos = skip_whitespace(body, pos);
        let rest = &body[pos..];

        if rest.is_empty() {
            break;
        }

        if let Some(title) = rest.strip_prefix(',') {
            entry.title = title.trim().to_string();
            break;
        }

        match parse_attribute(rest) {
            Some((key, value, consumed)) => {
                apply_attribute(&mut entry, key, value);
                pos += consumed;
            }
            None => {
                // Loose text after the attributes is the title
                entry.title = rest.trim().to_string();
                break;
            }
        }
    }

    entry
}

fn skip_whitespace(s: &str, mut pos: usize) -> usize {
    while let Some(c) = s[pos..].chars().next() {
        if !c.is_whitespace() {
            break;
        }
        pos += c.len_utf8();
    }
    pos
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
}

/// Match `key="value"` or `key=value` at the start of `s`.
/// Returns the key, the value and the number of bytes consumed.
fn parse_attribute(s: &str) -> Option<(&str, &str, usize)> {
    let key_len = s.find(|c: char| !is_key_char(c)).unwrap_or(s.len());
    if key_len == 0 || !s[key_len..].starts_with('=') {
        return None;
    }

    let key = &s[..key_len];
    let after_eq = key_len + 1;
    let value_part = &s[after_eq..];

    if let Some(quoted) = value_part.strip_prefix('"') {
        // Quoted spans keep internal commas and spaces
        return match quoted.find('"') {
            Some(end) => Some((key, &quoted[..end], after_eq + 1 + end + 1)),
            None => Some((key, quoted, s.len())),
        };
    }

    let value_len = value_part
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(value_part.len());
    Some((key, &value_part[..value_len], after_eq + value_len))
}

fn apply_attribute(entry: &mut ParsedEntry, key: &str, value: &str) {
    let value = value.trim().to_string();
    match key.to_ascii_lowercase().as_str() {
        "tvg-id" => entry.id = value,
        "tvg-name" => entry.name = value,
        "tvg-logo" => entry.cover = value,
        "group-title" => entry.group = value,
        _ => {}
    }
}

/// Parse an M3U byte stream lazily, one entry at a time.
///
/// Each line read is bounded by `read_timeout`; the stream ends after the
/// first error.
pub fn parse_m3u_stream<R>(
    reader: R,
    mode: ParseMode,
    read_timeout: Duration,
) -> impl Stream<Item = Result<ParsedEntry, ReadError>> + Send
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    stream! {
        let mut reader = reader;
        let mut parser = M3uParser::new(mode);
        let mut buf: Vec<u8> = Vec::new();
        let mut failed = false;

        loop {
            buf.clear();

            let read_result = tokio::time::timeout(read_timeout, reader.read_until(b'\n', &mut buf)).await;
            let bytes_read = match read_result {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    yield Err(ReadError::Io(e));
                    failed = true;
                    break;
                }
                Err(_) => {
                    yield Err(ReadError::Timeout(read_timeout));
                    failed = true;
                    break;
                }
            };

            if bytes_read == 0 {
                break;
            }

            if buf.len() > MAX_LINE_BYTES {
                yield Err(ReadError::Parse(ParseError::LineTooLong {
                    line: parser.line_no() + 1,
                    max: MAX_LINE_BYTES,
                }));
                failed = true;
                break;
            }

            let line = String::from_utf8_lossy(&buf).into_owned();
            match parser.feed_line(&line) {
                Ok(Some(entry)) => yield Ok(entry),
                Ok(None) => {}
                Err(e) => {
                    yield Err(ReadError::Parse(e));
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            if let Err(e) = parser.finish() {
                yield Err(ReadError::Parse(e));
            }
        }

        if parser.dropped() > 0 {
            debug!(dropped = parser.dropped(), lines = parser.line_no(), "M3U parse dropped malformed entries");
        }
    }
}
