//! Xtream Codes Integration
//!
//! Integration with the Xtream Codes Player API v2.
//!
//! - **Detection**: classify subscription URLs and pull credentials out of
//!   Xtream playlist URLs
//! - **API Client**: authentication, categories and stream collections
//!
//! # URL Pattern Detection
//!
//! Xtream playlist URLs typically follow this pattern:
//! ```text
//! http://server:port/get.php?username=X&password=Y&type=m3u_plus&output=ts
//! ```
//!
//! When detected, the Player API is used directly instead of parsing the M3U:
//! ```text
//! http://server:port/player_api.php?username=X&password=Y&action=get_live_streams
//! ```

pub mod client;
pub mod detector;
pub mod types;

pub use client::{XtreamClient, XtreamError};
pub use detector::{detect_source, extract_credentials, local_path};
pub use types::{
    XtreamAuthResponse, XtreamCategory, XtreamCredentials, XtreamLiveStream, XtreamSeries,
    XtreamUserInfo, XtreamVodStream,
};
