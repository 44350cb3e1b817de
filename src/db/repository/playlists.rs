//! Playlist repository for database operations

use sqlx::PgPool;

use crate::db::models::{PlaylistRow, PLAYLIST_COLUMNS};
use crate::models::Playlist;

/// Create or fully replace a playlist
pub async fn upsert(pool: &PgPool, playlist: &Playlist) -> Result<(), sqlx::Error> {
    let creds = playlist.credentials.as_ref();

    sqlx::query(
        r#"
        INSERT INTO playlists (url, title, source, strategy, user_agent, xtream_server,
                               xtream_username, xtream_password, epg_urls, synced_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (url) DO UPDATE SET
            title = EXCLUDED.title,
            source = EXCLUDED.source,
            strategy = EXCLUDED.strategy,
            user_agent = EXCLUDED.user_agent,
            xtream_server = EXCLUDED.xtream_server,
            xtream_username = EXCLUDED.xtream_username,
            xtream_password = EXCLUDED.xtream_password,
            epg_urls = EXCLUDED.epg_urls,
            synced_at = EXCLUDED.synced_at,
            updated_at = NOW()
        "#,
    )
    .bind(&playlist.url)
    .bind(&playlist.title)
    .bind(playlist.source.as_str())
    .bind(playlist.strategy.as_str())
    .bind(&playlist.user_agent)
    .bind(creds.map(|c| c.server.as_str()))
    .bind(creds.map(|c| c.username.as_str()))
    .bind(creds.map(|c| c.password.as_str()))
    .bind(&playlist.epg_urls)
    .bind(playlist.synced_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find playlist by URL
pub async fn find_by_url(pool: &PgPool, url: &str) -> Result<Option<PlaylistRow>, sqlx::Error> {
    sqlx::query_as::<_, PlaylistRow>(&format!(
        "SELECT {} FROM playlists WHERE url = $1",
        PLAYLIST_COLUMNS
    ))
    .bind(url)
    .fetch_optional(pool)
    .await
}

/// All playlists, ordered for display
pub async fn list_all(pool: &PgPool) -> Result<Vec<PlaylistRow>, sqlx::Error> {
    sqlx::query_as::<_, PlaylistRow>(&format!(
        "SELECT {} FROM playlists ORDER BY title, url",
        PLAYLIST_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

/// Delete a playlist, returning the removed row
/// CASCADE removes its channels
pub async fn delete_by_url(pool: &PgPool, url: &str) -> Result<Option<PlaylistRow>, sqlx::Error> {
    sqlx::query_as::<_, PlaylistRow>(&format!(
        "DELETE FROM playlists WHERE url = $1 RETURNING {}",
        PLAYLIST_COLUMNS
    ))
    .bind(url)
    .fetch_optional(pool)
    .await
}

/// Record the completion time of a successful sync
pub async fn mark_synced(pool: &PgPool, url: &str, synced_at: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE playlists SET synced_at = $2, updated_at = NOW() WHERE url = $1",
    )
    .bind(url)
    .bind(synced_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Count playlists and channels
pub async fn get_stats(pool: &PgPool) -> Result<(i64, i64), sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM playlists) as playlists,
            (SELECT COUNT(*) FROM channels) as channels
        "#,
    )
    .fetch_one(pool)
    .await
}
