//! Database module
//!
//! PostgreSQL integration using sqlx with:
//! - Connection pool management and migrations
//! - Row types with FromRow
//! - Repository pattern for data access
//! - `PgStore`, the production `PlaylistStore`

pub mod models;
pub mod pool;
pub mod repository;
pub mod store;

// Re-export commonly used items
pub use pool::{create_pool, health_check, run_migrations};
pub use store::PgStore;
