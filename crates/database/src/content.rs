//! Day content lookups.

use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::error::{map_unique, Result};
use crate::models::{Content, NewContent};

/// Create a day of content.
pub async fn create_content(pool: &SqlitePool, content: &NewContent) -> Result<Content> {
    let id = sqlx::query(
        r#"
        INSERT INTO content (bot_id, day_number, title, body, reflection_prompt, media, is_active)
        VALUES (?, ?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(content.bot_id)
    .bind(content.day_number)
    .bind(&content.title)
    .bind(&content.body)
    .bind(&content.reflection_prompt)
    .bind(Json(&content.media))
    .execute(pool)
    .await
    .map_err(map_unique(
        "Content",
        format!("bot {} day {}", content.bot_id, content.day_number),
    ))?
    .last_insert_rowid();

    let created = sqlx::query_as::<_, Content>(
        r#"
        SELECT id, bot_id, day_number, title, body, reflection_prompt, media, is_active
        FROM content
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(created)
}

/// Active content for an exact day.
pub async fn get_content(pool: &SqlitePool, bot_id: i64, day_number: i64) -> Result<Option<Content>> {
    let content = sqlx::query_as::<_, Content>(
        r#"
        SELECT id, bot_id, day_number, title, body, reflection_prompt, media, is_active
        FROM content
        WHERE bot_id = ? AND day_number = ? AND is_active = 1
        "#,
    )
    .bind(bot_id)
    .bind(day_number)
    .fetch_optional(pool)
    .await?;

    Ok(content)
}

/// Active content for `day_number`, or the most recent active day before it.
pub async fn latest_content_up_to(
    pool: &SqlitePool,
    bot_id: i64,
    day_number: i64,
) -> Result<Option<Content>> {
    let content = sqlx::query_as::<_, Content>(
        r#"
        SELECT id, bot_id, day_number, title, body, reflection_prompt, media, is_active
        FROM content
        WHERE bot_id = ? AND day_number <= ? AND is_active = 1
        ORDER BY day_number DESC
        LIMIT 1
        "#,
    )
    .bind(bot_id)
    .bind(day_number)
    .fetch_optional(pool)
    .await?;

    Ok(content)
}

/// Deactivate (or reactivate) a day.
pub async fn set_content_active(pool: &SqlitePool, id: i64, is_active: bool) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE content SET is_active = ? WHERE id = ?
        "#,
    )
    .bind(is_active)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Day numbers in `1..=journey_length_days` with no active content.
pub async fn missing_days(pool: &SqlitePool, bot_id: i64, journey_length_days: i64) -> Result<Vec<i64>> {
    let present = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT day_number FROM content
        WHERE bot_id = ? AND is_active = 1
        "#,
    )
    .bind(bot_id)
    .fetch_all(pool)
    .await?;

    Ok((1..=journey_length_days)
        .filter(|day| !present.contains(day))
        .collect())
}
