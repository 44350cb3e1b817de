use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;

use crate::db;
use crate::AppState;

/// Root endpoint - basic status
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Playlist Sync",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    uptime: u64,
    store: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    postgres: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    playlists: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<i64>,
    syncs_running: Vec<String>,
}

/// GET /health - Advanced health check
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();

    let (store, postgres_ok, counts) = match &state.pool {
        Some(pool) => {
            let ok = db::health_check(pool).await;
            let counts = if ok {
                db::repository::playlists::get_stats(pool).await.ok()
            } else {
                None
            };
            ("postgres", Some(ok), counts)
        }
        None => ("memory", None, None),
    };

    // Only a failing database makes the service unhealthy
    let status = if postgres_ok == Some(false) { "unhealthy" } else { "ok" };

    Json(HealthResponse {
        status: status.to_string(),
        uptime,
        store,
        postgres: postgres_ok,
        playlists: counts.map(|(playlists, _)| playlists),
        channels: counts.map(|(_, channels)| channels),
        syncs_running: state.engine.registry().running(),
    })
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                b"Internal Server Error".to_vec(),
            )
        }
    }
}

/// Readiness probe (for Kubernetes)
pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.pool {
        Some(pool) if !db::health_check(pool).await => {
            (StatusCode::SERVICE_UNAVAILABLE, "not ready - postgres unavailable")
        }
        _ => (StatusCode::OK, "ready"),
    }
}

/// Liveness probe (for Kubernetes)
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}
