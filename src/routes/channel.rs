use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{error_body, sync_error, ApiError};
use crate::models::{Channel, ChannelPatch};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsQuery {
    pub playlist_url: String,
    /// Include hidden channels (default: true)
    pub hidden: Option<bool>,
    pub favourites_only: Option<bool>,
}

/// GET /api/channels?playlistUrl= - channels of a playlist in playlist order
pub async fn list_channels(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChannelsQuery>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    let mut channels = state
        .engine
        .channels(&query.playlist_url)
        .await
        .map_err(sync_error)?;

    if !query.hidden.unwrap_or(true) {
        channels.retain(|c| !c.hidden);
    }
    if query.favourites_only.unwrap_or(false) {
        channels.retain(|c| c.favourite);
    }

    Ok(Json(channels))
}

/// PATCH /api/channels/:id - set favourite, hidden and/or seen
pub async fn update_channel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<ChannelPatch>,
) -> Result<Json<Channel>, ApiError> {
    if patch.is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "nothing to update"));
    }

    state
        .engine
        .update_channel(&id, &patch)
        .await
        .map(Json)
        .map_err(sync_error)
}
