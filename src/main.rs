use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playlist_sync::config::{Config, StoreBackend};
use playlist_sync::db::{create_pool, run_migrations, PgStore};
use playlist_sync::routes;
use playlist_sync::services::scheduler::start_refresh_task;
use playlist_sync::services::sync::SyncEngine;
use playlist_sync::store::{InMemoryStore, PlaylistStore};
use playlist_sync::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playlist_sync=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting Playlist Sync v{}", env!("CARGO_PKG_VERSION"));

    // Initialize storage
    let (store, pool): (Arc<dyn PlaylistStore>, Option<PgPool>) = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = create_pool(&config).await?;
            tracing::info!("PostgreSQL connected");

            run_migrations(&pool).await?;
            tracing::info!("Database migrations completed");

            let store: Arc<dyn PlaylistStore> = Arc::new(PgStore::new(pool.clone()));
            (store, Some(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            let store: Arc<dyn PlaylistStore> = Arc::new(InMemoryStore::new());
            (store, None)
        }
    };

    // Initialize sync engine
    let engine = SyncEngine::new(store, config.sync_config())?;
    tracing::info!(
        batch_size = config.sync_batch_size,
        reconcile_mode = ?config.reconcile_mode,
        parse_mode = ?config.parse_mode,
        "Sync engine initialized"
    );

    // Start auto-refresh task (runs in background)
    if config.auto_refresh_secs > 0 {
        tokio::spawn(start_refresh_task(engine.clone(), config.auto_refresh_secs));
    }

    // Build application state
    let state = Arc::new(AppState {
        config,
        engine,
        pool,
        start_time: Instant::now(),
    });

    let app = routes::router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
