//! Source detection
//!
//! Classifies a subscription URL as a local file, an Xtream Codes account or a
//! plain M3U playlist. Local files are only recognised inside the configured
//! playlist directory. Credentials are checked against the server when the
//! playlist is synced.

use super::types::XtreamCredentials;
use crate::models::DataSource;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Extract Xtream credentials from a playlist URL
///
/// Supported URL patterns:
/// - `http://server:port/get.php?username=X&password=Y&type=m3u_plus&output=ts`
/// - `http://server:port/player_api.php?username=X&password=Y`
///
/// # Returns
/// - `Some(XtreamCredentials)` if URL matches Xtream pattern
/// - `None` if URL is not an Xtream URL
pub fn extract_credentials(playlist_url: &str) -> Option<XtreamCredentials> {
    let parsed = match Url::parse(playlist_url) {
        Ok(url) => url,
        Err(e) => {
            debug!("Failed to parse URL: {}", e);
            return None;
        }
    };

    let path = parsed.path().to_lowercase();
    if !path.ends_with("/get.php") && !path.ends_with("/player_api.php") {
        return None;
    }

    let params: std::collections::HashMap<_, _> = parsed.query_pairs().collect();

    // Must have both username and password
    let username = params.get("username")?.to_string();
    let password = params.get("password")?.to_string();

    if username.is_empty() || password.is_empty() {
        debug!("Empty username or password in URL");
        return None;
    }

    // Reconstruct server base URL
    let host = parsed.host_str()?;
    let port_suffix = parsed
        .port()
        .map(|p| format!(":{}", p))
        .unwrap_or_default();

    let server = format!("{}://{}{}", parsed.scheme(), host, port_suffix);

    debug!(
        "Extracted Xtream credentials: server={}, username={}",
        server, username
    );

    Some(XtreamCredentials::new(&server, &username, &password))
}

/// Filesystem path for `file://` URLs and bare paths that resolve to a file
/// inside `root`. Without a root, local playlists are disabled.
pub fn local_path(playlist_url: &str, root: Option<&Path>) -> Option<PathBuf> {
    let root = root?;

    let candidate = match Url::parse(playlist_url) {
        Ok(parsed) if parsed.scheme() == "file" => parsed.to_file_path().ok()?,
        // Windows drive letters parse as one-letter schemes
        Ok(parsed) if parsed.scheme().len() > 1 => return None,
        _ => PathBuf::from(playlist_url),
    };

    let root = root.canonicalize().ok()?;
    let resolved = candidate.canonicalize().ok()?;
    if !resolved.starts_with(&root) || !resolved.is_file() {
        debug!(path = %candidate.display(), "Local path outside the playlist directory");
        return None;
    }

    Some(resolved)
}

/// Classify a subscription URL
pub fn detect_source(
    playlist_url: &str,
    local_root: Option<&Path>,
) -> (DataSource, Option<XtreamCredentials>) {
    if local_path(playlist_url, local_root).is_some() {
        return (DataSource::LocalFile, None);
    }

    match extract_credentials(playlist_url) {
        Some(creds) => (DataSource::Xtream, Some(creds)),
        None => (DataSource::M3u, None),
    }
}
