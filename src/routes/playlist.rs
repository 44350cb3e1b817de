use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::StreamExt;

use super::{error_body, sync_error, ApiError};
use crate::models::{Playlist, Process, SyncStrategy};
use crate::services::sync::ProgressStream;
use crate::store::PlaylistStore;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub strategy: SyncStrategy,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub url: String,
    /// Defaults to the playlist's stored strategy
    pub strategy: Option<SyncStrategy>,
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpgLinkRequest {
    pub playlist_url: String,
    pub epg_url: String,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

fn require_url(url: &str) -> Result<(), ApiError> {
    if url.trim().is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "url is required"));
    }
    Ok(())
}

/// Relay sync progress as server-sent events named after the process state
fn progress_events(
    progress: ProgressStream,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = progress.map(|process| {
        let name = match &process {
            Process::Loading { .. } => "loading",
            Process::Success { .. } => "success",
            Process::Failure { .. } => "failure",
        };
        Event::default().event(name).json_data(&process)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// GET /api/playlists
pub async fn list_playlists(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Playlist>>, ApiError> {
    state.engine.playlists().await.map(Json).map_err(sync_error)
}

/// POST /api/playlists - subscribe and stream the initial sync
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_url(&payload.url)?;
    let url = payload.url.trim();
    let title = if payload.title.trim().is_empty() { url } else { payload.title.trim() };

    tracing::info!("Subscribe request for {}", url);
    let progress = state.engine.subscribe(title, url, payload.strategy).await;
    Ok(progress_events(progress))
}

/// POST /api/playlists/epg - register an EPG source
pub async fn subscribe_epg(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<Json<Playlist>, ApiError> {
    require_url(&payload.url)?;
    let url = payload.url.trim();
    let title = if payload.title.trim().is_empty() { url } else { payload.title.trim() };

    state
        .engine
        .subscribe_epg(title, url)
        .await
        .map(Json)
        .map_err(sync_error)
}

/// POST /api/playlists/refresh - re-sync and stream progress
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_url(&payload.url)?;

    let strategy = match payload.strategy {
        Some(strategy) => strategy,
        None => state
            .engine
            .store()
            .get_playlist(&payload.url)
            .await
            .map_err(|e| sync_error(e.into()))?
            .map(|playlist| playlist.strategy)
            .unwrap_or_default(),
    };

    let progress = state.engine.refresh(&payload.url, strategy).await;
    Ok(progress_events(progress))
}

/// POST /api/playlists/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UrlRequest>,
) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.engine.cancel(&payload.url),
    })
}

/// DELETE /api/playlists?url= - remove a playlist and its channels
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrlRequest>,
) -> Result<Json<Playlist>, ApiError> {
    match state.engine.unsubscribe(&query.url).await.map_err(sync_error)? {
        Some(playlist) => Ok(Json(playlist)),
        None => Err(error_body(StatusCode::NOT_FOUND, "Playlist not found")),
    }
}

/// POST /api/playlists/epg-link
pub async fn link_epg(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EpgLinkRequest>,
) -> Result<Json<Playlist>, ApiError> {
    require_url(&payload.epg_url)?;
    state
        .engine
        .link_epg(&payload.playlist_url, &payload.epg_url)
        .await
        .map(Json)
        .map_err(sync_error)
}

/// DELETE /api/playlists/epg-link
pub async fn unlink_epg(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EpgLinkRequest>,
) -> Result<Json<Playlist>, ApiError> {
    state
        .engine
        .unlink_epg(&payload.playlist_url, &payload.epg_url)
        .await
        .map(Json)
        .map_err(sync_error)
}
