//! Xtream Codes API Types
//!
//! Type definitions for the subset of Xtream Codes Player API v2 responses
//! the sync engine consumes. Servers disagree on whether ids are numbers or
//! strings, so id-like fields accept both.

use serde::{Deserialize, Deserializer, Serialize};

/// Extracted credentials from a playlist URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XtreamCredentials {
    /// Server base URL (e.g., "http://example.com:8080")
    pub server: String,
    /// Username for authentication
    pub username: String,
    /// Password for authentication
    pub password: String,
}

impl XtreamCredentials {
    pub fn new(server: &str, username: &str, password: &str) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Build the player_api.php base URL
    pub fn api_url(&self) -> String {
        format!(
            "{}/player_api.php?username={}&password={}",
            self.server,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.password)
        )
    }

    /// Build playback URL for live streams
    pub fn live_url(&self, stream_id: i64, extension: &str) -> String {
        self.playback_url("live", stream_id, extension)
    }

    /// Build playback URL for VOD
    pub fn vod_url(&self, stream_id: i64, extension: &str) -> String {
        self.playback_url("movie", stream_id, extension)
    }

    /// Build playback URL for series
    pub fn series_url(&self, series_id: i64, extension: &str) -> String {
        self.playback_url("series", series_id, extension)
    }

    fn playback_url(&self, kind: &str, id: i64, extension: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}.{}",
            self.server, kind, self.username, self.password, id, extension
        )
    }
}

// ============================================================================
// Authentication Response Types
// ============================================================================

/// Main authentication response from player_api.php (no action)
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamAuthResponse {
    pub user_info: XtreamUserInfo,
    #[serde(default)]
    pub server_info: Option<XtreamServerInfo>,
}

/// User account information
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamUserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub exp_date: Option<String>,
    #[serde(default)]
    pub allowed_output_formats: Option<Vec<String>>,
}

impl XtreamUserInfo {
    /// Check if account is active
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }

    /// Container extension for live playback URLs: the preferred format if
    /// the server allows it, else the first allowed format, else `ts`.
    pub fn live_extension(&self, preferred: &str) -> String {
        match self.allowed_output_formats.as_deref() {
            Some(formats) if formats.iter().any(|f| f.eq_ignore_ascii_case(preferred)) => {
                preferred.to_string()
            }
            Some([first, ..]) if !first.is_empty() => first.clone(),
            _ => "ts".to_string(),
        }
    }
}

/// Server information
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamServerInfo {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub port: Option<String>,
    #[serde(default)]
    pub server_protocol: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

// ============================================================================
// Category Types
// ============================================================================

/// Category for live, VOD, or series
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamCategory {
    #[serde(deserialize_with = "de_string")]
    pub category_id: String,
    #[serde(default)]
    pub category_name: String,
}

// ============================================================================
// Stream Types
// ============================================================================

/// Live stream (channel) information
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamLiveStream {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(deserialize_with = "de_id")]
    pub stream_id: i64,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default)]
    pub epg_channel_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub category_id: Option<String>,
}

/// VOD (movie) stream information
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamVodStream {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(deserialize_with = "de_id")]
    pub stream_id: i64,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub category_id: Option<String>,
    #[serde(default)]
    pub container_extension: Option<String>,
}

/// Series information from get_series
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct XtreamSeries {
    #[serde(deserialize_with = "de_id")]
    pub series_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub category_id: Option<String>,
    #[serde(default)]
    pub container_extension: Option<String>,
}

// ============================================================================
// Lenient field decoding
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(n) => n.to_string(),
            StringOrNumber::Float(n) => n.to_string(),
        }
    }
}

fn de_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(deserializer).map(StringOrNumber::into_string)
}

fn de_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(StringOrNumber::into_string))
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Int(n) => Ok(n),
        StringOrNumber::Float(n) if n.fract() == 0.0 => Ok(n as i64),
        StringOrNumber::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid id: {}", s))),
        StringOrNumber::Float(n) => Err(serde::de::Error::custom(format!("invalid id: {}", n))),
    }
}
