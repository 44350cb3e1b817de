pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use sqlx::PgPool;
use std::time::Instant;

use crate::config::Config;
use crate::services::sync::SyncEngine;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub engine: SyncEngine,
    /// Set when channels are persisted in PostgreSQL
    pub pool: Option<PgPool>,
    pub start_time: Instant,
}
