pub mod channel;
pub mod health;
pub mod playlist;

use axum::{
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::services::sync::SyncError;
use crate::AppState;

pub type ApiError = (StatusCode, Json<serde_json::Value>);

pub fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// Map an engine error to a status code and JSON body
pub fn sync_error(e: SyncError) -> ApiError {
    let status = match &e {
        SyncError::NotFound(_) => StatusCode::NOT_FOUND,
        SyncError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SyncError::Cancelled => StatusCode::CONFLICT,
        _ => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
        tracing::error!(error = %e, "Request failed");
    }
    error_body(status, e.to_string())
}

/// All HTTP routes with the standard middleware stack
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/ready", get(health::ready))
        .route("/live", get(health::live))
        // Playlist endpoints
        .route(
            "/api/playlists",
            get(playlist::list_playlists)
                .post(playlist::subscribe)
                .delete(playlist::unsubscribe),
        )
        .route("/api/playlists/epg", post(playlist::subscribe_epg))
        .route("/api/playlists/refresh", post(playlist::refresh))
        .route("/api/playlists/cancel", post(playlist::cancel))
        .route(
            "/api/playlists/epg-link",
            post(playlist::link_epg).delete(playlist::unlink_epg),
        )
        // Channel endpoints
        .route("/api/channels", get(channel::list_channels))
        .route("/api/channels/:id", patch(channel::update_channel))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
