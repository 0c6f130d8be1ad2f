//! Append-only message log.
//!
//! Rows are inserted once. The only later write is the single tag merge
//! ([`record_tag_merge`]) and the explicit administrative re-tag
//! ([`retag_message`]).

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Direction, MessageLog, NewMessageLog, TagMerge};

const LOG_COLUMNS: &str = "id, user_id, direction, raw_text, sentiment, classifier_tags, tags, confidence, is_human_handoff, journey_day, content_day, tags_merged_at, created_at";

/// Append a message and return its ID.
pub async fn append(pool: &SqlitePool, entry: &NewMessageLog) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO message_logs (user_id, direction, raw_text, tags, is_human_handoff, journey_day, content_day, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.direction)
    .bind(&entry.raw_text)
    .bind(Json(&entry.tags))
    .bind(entry.is_human_handoff)
    .bind(entry.journey_day)
    .bind(entry.content_day)
    .bind(entry.created_at)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Get a message by ID.
pub async fn get_message(pool: &SqlitePool, id: i64) -> Result<MessageLog> {
    sqlx::query_as::<_, MessageLog>(&format!(
        "SELECT {} FROM message_logs WHERE id = ?",
        LOG_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "MessageLog",
        id: id.to_string(),
    })
}

/// Write the classification result onto a row, once.
///
/// Returns `false` if the row was already merged; existing tags are kept.
pub async fn record_tag_merge(
    pool: &SqlitePool,
    id: i64,
    merge: &TagMerge,
    at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE message_logs
        SET sentiment = ?, classifier_tags = ?, tags = ?, confidence = ?, tags_merged_at = ?
        WHERE id = ? AND tags_merged_at IS NULL
        "#,
    )
    .bind(merge.sentiment)
    .bind(Json(&merge.classifier_tags))
    .bind(Json(&merge.tags))
    .bind(merge.confidence)
    .bind(at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Overwrite a row's tags as part of an administrative re-tag.
pub async fn retag_message(
    pool: &SqlitePool,
    id: i64,
    merge: &TagMerge,
    at: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE message_logs
        SET sentiment = ?, classifier_tags = ?, tags = ?, confidence = ?, tags_merged_at = ?
        WHERE id = ?
        "#,
    )
    .bind(merge.sentiment)
    .bind(Json(&merge.classifier_tags))
    .bind(Json(&merge.tags))
    .bind(merge.confidence)
    .bind(at)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "MessageLog",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Whether the user sent exactly `raw_text` at or after `since`.
pub async fn has_recent_incoming(
    pool: &SqlitePool,
    user_id: i64,
    raw_text: &str,
    since: DateTime<Utc>,
) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM message_logs
        WHERE user_id = ? AND direction = ? AND raw_text = ? AND created_at >= ?
        "#,
    )
    .bind(user_id)
    .bind(Direction::Incoming)
    .bind(raw_text)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Whether day `day` was already delivered to the user at or after `since`.
pub async fn has_day_delivery(
    pool: &SqlitePool,
    user_id: i64,
    day: i64,
    since: DateTime<Utc>,
) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM message_logs
        WHERE user_id = ? AND direction = ? AND content_day = ? AND created_at >= ?
        "#,
    )
    .bind(user_id)
    .bind(Direction::Outgoing)
    .bind(day)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Messages of one user, oldest first.
pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<MessageLog>> {
    let rows = sqlx::query_as::<_, MessageLog>(&format!(
        "SELECT {} FROM message_logs WHERE user_id = ? ORDER BY id",
        LOG_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// IDs of every incoming message for a bot, oldest first.
pub async fn list_incoming_ids_for_bot(pool: &SqlitePool, bot_id: i64) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT m.id
        FROM message_logs m
        JOIN users u ON u.id = m.user_id
        WHERE u.bot_id = ? AND m.direction = ?
        ORDER BY m.id
        "#,
    )
    .bind(bot_id)
    .bind(Direction::Incoming)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
