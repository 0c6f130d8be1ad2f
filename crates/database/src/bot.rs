//! Bot reads and per-bot delivery bookkeeping.
//!
//! Bots are authored elsewhere; the engine only reads them. `create_bot`
//! exists for provisioning scripts and tests.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Bot, BotStatus, NewBot};

const BOT_COLUMNS: &str = "id, name, status, journey_length_days, delivery_interval, templates, persona, language, credentials, created_at";

/// Create a bot and return it.
pub async fn create_bot(pool: &SqlitePool, bot: &NewBot) -> Result<Bot> {
    let id = sqlx::query(
        r#"
        INSERT INTO bots (name, status, journey_length_days, delivery_interval, templates, persona, language, credentials, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&bot.name)
    .bind(BotStatus::Active)
    .bind(bot.journey_length_days)
    .bind(Json(&bot.delivery_interval))
    .bind(Json(&bot.templates))
    .bind(&bot.persona)
    .bind(&bot.language)
    .bind(Json(&bot.credentials))
    .bind(Utc::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_bot(pool, id).await
}

/// Get a bot by ID.
pub async fn get_bot(pool: &SqlitePool, id: i64) -> Result<Bot> {
    sqlx::query_as::<_, Bot>(&format!("SELECT {} FROM bots WHERE id = ?", BOT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Bot",
            id: id.to_string(),
        })
}

/// List bots with `status = active`.
pub async fn list_active_bots(pool: &SqlitePool) -> Result<Vec<Bot>> {
    let bots = sqlx::query_as::<_, Bot>(&format!(
        "SELECT {} FROM bots WHERE status = ? ORDER BY id",
        BOT_COLUMNS
    ))
    .bind(BotStatus::Active)
    .fetch_all(pool)
    .await?;

    Ok(bots)
}

/// Change a bot's status.
pub async fn set_bot_status(pool: &SqlitePool, id: i64, status: BotStatus) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE bots
        SET status = ?
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Bot",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// When the scheduler last delivered for this bot, if ever.
pub async fn last_delivery_at(pool: &SqlitePool, bot_id: i64) -> Result<Option<DateTime<Utc>>> {
    let at = sqlx::query_scalar::<_, DateTime<Utc>>(
        r#"
        SELECT last_delivery_at FROM bot_schedules WHERE bot_id = ?
        "#,
    )
    .bind(bot_id)
    .fetch_optional(pool)
    .await?;

    Ok(at)
}

/// Record a completed delivery batch for this bot.
pub async fn record_delivery(pool: &SqlitePool, bot_id: i64, at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO bot_schedules (bot_id, last_delivery_at)
        VALUES (?, ?)
        ON CONFLICT(bot_id) DO UPDATE SET last_delivery_at = excluded.last_delivery_at
        "#,
    )
    .bind(bot_id)
    .bind(at)
    .execute(pool)
    .await?;

    Ok(())
}
