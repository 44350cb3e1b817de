//! Channel repository with batched upserts

use sqlx::{PgExecutor, PgPool};

use crate::db::models::{ChannelColumns, ChannelRow, CHANNEL_COLUMNS};
use crate::models::{dedup_last_wins, Channel, ChannelPatch};

/// Upsert a batch keyed by `(playlist_url, url)` in one statement
///
/// Only upstream-owned columns are overwritten on conflict; new rows take the
/// column defaults for favourite, hidden and seen. Duplicate keys are collapsed
/// first since one `INSERT .. ON CONFLICT` cannot touch a row twice.
pub async fn upsert_batch<'e, E>(executor: E, channels: &[Channel]) -> Result<usize, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let deduped = dedup_last_wins(channels);
    let columns = ChannelColumns::from_channels(&deduped);
    if columns.is_empty() {
        return Ok(0);
    }

    sqlx::query(
        r#"
        INSERT INTO channels (id, playlist_url, url, title, category, cover, relation_id)
        SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::text[], $6::text[], $7::text[])
        ON CONFLICT (playlist_url, url) DO UPDATE SET
            title = EXCLUDED.title,
            category = EXCLUDED.category,
            cover = EXCLUDED.cover,
            relation_id = EXCLUDED.relation_id
        "#,
    )
    .bind(&columns.ids)
    .bind(&columns.playlist_urls)
    .bind(&columns.urls)
    .bind(&columns.titles)
    .bind(&columns.categories)
    .bind(&columns.covers)
    .bind(&columns.relation_ids)
    .execute(executor)
    .await?;

    Ok(columns.len())
}

/// Delete channels of a playlist whose URL is not in `keep`
pub async fn delete_not_in<'e, E>(
    executor: E,
    playlist_url: &str,
    keep: &[String],
) -> Result<u64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM channels WHERE playlist_url = $1 AND NOT (url = ANY($2))")
        .bind(playlist_url)
        .bind(keep)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

/// Channels of a playlist in first-seen order
pub async fn find_by_playlist(
    pool: &PgPool,
    playlist_url: &str,
) -> Result<Vec<ChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelRow>(&format!(
        "SELECT {} FROM channels WHERE playlist_url = $1 ORDER BY seq",
        CHANNEL_COLUMNS
    ))
    .bind(playlist_url)
    .fetch_all(pool)
    .await
}

/// Set user-owned state; absent patch fields keep their value
pub async fn update_state(
    pool: &PgPool,
    id: &str,
    patch: &ChannelPatch,
) -> Result<Option<ChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelRow>(&format!(
        r#"
        UPDATE channels SET
            favourite = COALESCE($2, favourite),
            hidden = COALESCE($3, hidden),
            seen = COALESCE($4, seen)
        WHERE id = $1
        RETURNING {}
        "#,
        CHANNEL_COLUMNS
    ))
    .bind(id)
    .bind(patch.favourite)
    .bind(patch.hidden)
    .bind(patch.seen)
    .fetch_optional(pool)
    .await
}
