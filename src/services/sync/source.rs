//! Upstream sources
//!
//! Opens a playlist's upstream and exposes it as one lazy, single-pass
//! stream of parsed entries, whatever the format.

use async_stream::try_stream;
use futures::{stream, Stream, StreamExt};
use reqwest::{header, Client};
use std::pin::Pin;
use tokio::io::BufReader;
use tokio_util::io::StreamReader;
use tracing::{debug, info};

use super::error::SyncError;
use crate::config::SyncConfig;
use crate::models::{DataSource, Playlist};
use crate::services::parser::{parse_m3u_stream, ParsedEntry, XtreamKind, XtreamMapper};
use crate::services::xtream::{local_path, XtreamClient, XtreamCredentials};

pub type EntryStream = Pin<Box<dyn Stream<Item = Result<ParsedEntry, SyncError>> + Send>>;

/// Open the upstream of `playlist`
pub async fn open(
    http: &Client,
    config: &SyncConfig,
    playlist: &Playlist,
) -> Result<EntryStream, SyncError> {
    let user_agent = playlist
        .user_agent
        .clone()
        .unwrap_or_else(|| config.user_agent.clone());

    match playlist.source {
        DataSource::M3u => open_http(http, config, &playlist.url, &user_agent).await,
        DataSource::LocalFile => open_local(config, &playlist.url).await,
        DataSource::Xtream => {
            let creds = playlist.credentials.clone().ok_or_else(|| {
                SyncError::NotFound(format!("xtream credentials for {}", playlist.url))
            })?;
            Ok(Box::pin(xtream_entries(
                http.clone(),
                config.clone(),
                creds,
                user_agent,
            )))
        }
        // Programme data is not ingested
        DataSource::Epg => Ok(Box::pin(stream::empty::<Result<ParsedEntry, SyncError>>())),
    }
}

/// Stream an M3U body over HTTP(S)
async fn open_http(
    http: &Client,
    config: &SyncConfig,
    url: &str,
    user_agent: &str,
) -> Result<EntryStream, SyncError> {
    let response = http
        .get(url)
        .header(header::USER_AGENT, user_agent)
        .send()
        .await
        .map_err(SyncError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::Http(status.as_u16()));
    }

    if let Some(len) = response.content_length() {
        if len > config.max_body_bytes {
            return Err(SyncError::TooLarge {
                size_mb: len as f64 / 1024.0 / 1024.0,
                limit_mb: config.max_body_bytes / 1024 / 1024,
            });
        }
        info!("Playlist size: {:.2} MB", len as f64 / 1024.0 / 1024.0);
    }

    // Stream the response body line by line
    let bytes_stream = response
        .bytes_stream()
        .map(|result| result.map_err(body_error));
    let reader = BufReader::new(StreamReader::new(bytes_stream));

    Ok(Box::pin(
        parse_m3u_stream(reader, config.parse_mode, config.read_line_timeout)
            .map(|result| result.map_err(SyncError::from)),
    ))
}

/// Keep whole-request timeouts distinguishable once the body is read as io
fn body_error(e: reqwest::Error) -> std::io::Error {
    let kind = if e.is_timeout() {
        std::io::ErrorKind::TimedOut
    } else {
        std::io::ErrorKind::Other
    };
    std::io::Error::new(kind, e)
}

/// Read an M3U file from local storage
async fn open_local(config: &SyncConfig, url: &str) -> Result<EntryStream, SyncError> {
    let path = local_path(url, config.local_playlist_dir.as_deref())
        .ok_or_else(|| SyncError::NotFound(format!("local file {}", url)))?;
    debug!(path = %path.display(), "Opening local playlist");

    let file = tokio::fs::File::open(&path).await?;
    let reader = BufReader::new(file);

    Ok(Box::pin(
        parse_m3u_stream(reader, config.parse_mode, config.read_line_timeout)
            .map(|result| result.map_err(SyncError::from)),
    ))
}

/// Authenticate, then walk the live, VOD and series collections in order
fn xtream_entries(
    http: Client,
    config: SyncConfig,
    creds: XtreamCredentials,
    user_agent: String,
) -> impl Stream<Item = Result<ParsedEntry, SyncError>> + Send {
    try_stream! {
        let client = XtreamClient::new(http, &creds, &user_agent);

        let auth = client.get_auth().await.map_err(SyncError::from)?;
        let live_extension = auth.user_info.live_extension(&config.xtream_live_format);
        debug!(server = %creds.server, live_extension = %live_extension, "Xtream account authenticated");

        for kind in XtreamKind::ALL {
            let categories = client.get_categories(kind).await.map_err(SyncError::from)?;
            let elements = client.get_streams(kind).await.map_err(SyncError::from)?;
            info!(kind = kind.as_str(), streams = elements.len(), categories = categories.len(), "Fetched Xtream collection");

            let mut mapper = XtreamMapper::new(kind, creds.clone(), &categories, &live_extension, config.parse_mode);
            for element in elements {
                if let Some(entry) = mapper.map(element).map_err(SyncError::from)? {
                    yield entry;
                }
            }

            if mapper.dropped() > 0 {
                debug!(kind = kind.as_str(), dropped = mapper.dropped(), "Skipped malformed Xtream elements");
            }
        }
    }
}
