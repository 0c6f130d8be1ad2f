//! Tag rule storage.

use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{NewTagRule, TagRule};

/// Create an active rule and return its ID.
pub async fn create_rule(pool: &SqlitePool, rule: &NewTagRule) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO tag_rules (bot_id, name, trigger, conditions, actions, priority, is_active)
        VALUES (?, ?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(rule.bot_id)
    .bind(&rule.name)
    .bind(Json(&rule.trigger))
    .bind(Json(&rule.conditions))
    .bind(Json(&rule.actions))
    .bind(rule.priority)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Active rules for a bot (including global rules), highest priority first.
///
/// Ties keep creation order so evaluation is deterministic.
pub async fn list_active_rules(pool: &SqlitePool, bot_id: i64) -> Result<Vec<TagRule>> {
    let rules = sqlx::query_as::<_, TagRule>(
        r#"
        SELECT id, bot_id, name, trigger, conditions, actions, priority, is_active
        FROM tag_rules
        WHERE is_active = 1 AND (bot_id IS NULL OR bot_id = ?)
        ORDER BY priority DESC, id ASC
        "#,
    )
    .bind(bot_id)
    .fetch_all(pool)
    .await?;

    Ok(rules)
}

/// Enable or disable a rule.
pub async fn set_rule_active(pool: &SqlitePool, id: i64, is_active: bool) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE tag_rules SET is_active = ? WHERE id = ?
        "#,
    )
    .bind(is_active)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}
