use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::parser::ParseMode;
use crate::services::reconciler::ReconcileMode;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,

    // Storage
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub db_max_connections: u32,

    // Fetching
    pub fetch_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub read_line_timeout_ms: u64,
    pub max_m3u_size_mb: usize,
    pub user_agent: String,
    pub local_playlist_dir: Option<PathBuf>,

    // Sync
    pub sync_batch_size: usize,
    pub reconcile_mode: ReconcileMode,
    pub parse_mode: ParseMode,
    pub xtream_live_format: String,
    pub auto_refresh_secs: u64,
}

/// Where playlists and channels are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

fn var_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            // Server
            port: var_or("PORT", 3001),

            // Storage
            store_backend: match env::var("STORE").unwrap_or_default().to_ascii_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                _ => StoreBackend::Postgres,
            },
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/playlist_sync".to_string()),
            db_max_connections: var_or("DB_MAX_CONNECTIONS", 10),

            // Fetching
            fetch_timeout_ms: var_or("FETCH_TIMEOUT_MS", 300_000), // 5 minutes
            connect_timeout_ms: var_or("CONNECT_TIMEOUT_MS", 15_000),
            read_line_timeout_ms: var_or("READ_LINE_TIMEOUT_MS", 10_000),
            max_m3u_size_mb: var_or("MAX_M3U_SIZE_MB", 500),
            // Use VLC user agent to avoid IPTV server blocks
            user_agent: env::var("USER_AGENT")
                .unwrap_or_else(|_| "VLC/3.0.20 LibVLC/3.0.20".to_string()),
            // Local playlists are disabled unless a directory is configured
            local_playlist_dir: env::var("LOCAL_PLAYLIST_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),

            // Sync
            sync_batch_size: var_or("SYNC_BATCH_SIZE", 500),
            reconcile_mode: env::var("RECONCILE_MODE")
                .ok()
                .and_then(|v| ReconcileMode::parse(&v))
                .unwrap_or_default(),
            parse_mode: env::var("PARSE_MODE")
                .ok()
                .and_then(|v| ParseMode::parse(&v))
                .unwrap_or_default(),
            xtream_live_format: env::var("XTREAM_LIVE_FORMAT").unwrap_or_else(|_| "ts".to_string()),
            auto_refresh_secs: var_or("AUTO_REFRESH_SECS", 0),
        }
    }

    /// Settings the sync engine needs
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_line_timeout: Duration::from_millis(self.read_line_timeout_ms),
            max_body_bytes: (self.max_m3u_size_mb as u64) * 1024 * 1024,
            user_agent: self.user_agent.clone(),
            local_playlist_dir: self.local_playlist_dir.clone(),
            batch_size: self.sync_batch_size,
            reconcile_mode: self.reconcile_mode,
            parse_mode: self.parse_mode,
            xtream_live_format: self.xtream_live_format.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Sync engine settings, independent of the process environment
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub fetch_timeout: Duration,
    pub connect_timeout: Duration,
    pub read_line_timeout: Duration,
    pub max_body_bytes: u64,
    pub user_agent: String,
    pub local_playlist_dir: Option<PathBuf>,
    pub batch_size: usize,
    pub reconcile_mode: ReconcileMode,
    pub parse_mode: ParseMode,
    pub xtream_live_format: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(15),
            read_line_timeout: Duration::from_secs(10),
            max_body_bytes: 500 * 1024 * 1024,
            user_agent: "VLC/3.0.20 LibVLC/3.0.20".to_string(),
            local_playlist_dir: None,
            batch_size: 500,
            reconcile_mode: ReconcileMode::Streaming,
            parse_mode: ParseMode::Lenient,
            xtream_live_format: "ts".to_string(),
        }
    }
}
