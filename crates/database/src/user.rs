//! User operations.
//!
//! Journey fields (`status`, `current_day`, `join_date`, `completion_date`)
//! change only through [`compare_and_set_state`], which applies the write
//! only if the row still holds the state the caller read.

use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::error::{map_unique, DatabaseError, Result};
use crate::models::{JourneyState, NewUser, User, UserStatus};

const USER_COLUMNS: &str = "id, bot_id, platform, sender_key, status, current_day, join_date, completion_date, tags, display_name, locale, source_ip, awaiting_handoff_choice";

/// Create a user at day 1.
pub async fn create_user(pool: &SqlitePool, user: &NewUser) -> Result<User> {
    let id = sqlx::query(
        r#"
        INSERT INTO users (bot_id, platform, sender_key, status, current_day, join_date, display_name, locale, source_ip)
        VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)
        "#,
    )
    .bind(user.bot_id)
    .bind(user.platform)
    .bind(&user.sender_key)
    .bind(user.status)
    .bind(user.join_date)
    .bind(&user.display_name)
    .bind(&user.locale)
    .bind(&user.source_ip)
    .execute(pool)
    .await
    .map_err(map_unique(
        "User",
        format!("bot {} sender {}", user.bot_id, user.sender_key),
    ))?
    .last_insert_rowid();

    get_user(pool, id).await
}

/// Get a user by ID.
pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        })
}

/// Find a user by bot and canonical sender key.
pub async fn find_user(pool: &SqlitePool, bot_id: i64, sender_key: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE bot_id = ? AND sender_key = ?",
        USER_COLUMNS
    ))
    .bind(bot_id)
    .bind(sender_key)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// All active users of a bot.
pub async fn list_active_users(pool: &SqlitePool, bot_id: i64) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE bot_id = ? AND status = ? ORDER BY id",
        USER_COLUMNS
    ))
    .bind(bot_id)
    .bind(UserStatus::Active)
    .fetch_all(pool)
    .await?;

    Ok(users)
}

/// Atomically replace a user's journey state.
///
/// The write only lands if the row still has `expected.status` and
/// `expected.current_day`. Returns `false` when another writer got there
/// first; the caller must re-read before trying again.
pub async fn compare_and_set_state(
    pool: &SqlitePool,
    id: i64,
    expected: &JourneyState,
    next: &JourneyState,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET status = ?, current_day = ?, join_date = ?, completion_date = ?
        WHERE id = ? AND status = ? AND current_day = ?
        "#,
    )
    .bind(next.status)
    .bind(next.current_day)
    .bind(next.join_date)
    .bind(next.completion_date)
    .bind(id)
    .bind(expected.status)
    .bind(expected.current_day)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Set or clear the pending human-connection offer flag.
pub async fn set_awaiting_handoff(pool: &SqlitePool, id: i64, awaiting: bool) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users SET awaiting_handoff_choice = ? WHERE id = ?
        "#,
    )
    .bind(awaiting)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Union `tags` into the user's accumulated tags, keeping first-seen order.
pub async fn merge_tags(pool: &SqlitePool, id: i64, tags: &[String]) -> Result<Vec<String>> {
    let user = get_user(pool, id).await?;

    let mut merged = user.tags;
    for tag in tags {
        if !merged.contains(tag) {
            merged.push(tag.clone());
        }
    }

    sqlx::query(
        r#"
        UPDATE users SET tags = ? WHERE id = ?
        "#,
    )
    .bind(Json(&merged))
    .bind(id)
    .execute(pool)
    .await?;

    Ok(merged)
}
