//! Named leases.
//!
//! A lease row holds `(owner_token, renewed_at)`. Acquisition is a single
//! conditional upsert, so two processes racing for a free or stale lease
//! cannot both win.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::LeaseRecord;

/// Read a lease, if any process has ever held it.
pub async fn get_lease(pool: &SqlitePool, name: &str) -> Result<Option<LeaseRecord>> {
    let lease = sqlx::query_as::<_, LeaseRecord>(
        r#"
        SELECT name, owner_token, renewed_at
        FROM leases
        WHERE name = ?
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(lease)
}

/// Take the lease for `owner` if it is free, already ours, or stale.
///
/// A lease is stale when it was last renewed before `stale_before`.
/// Returns `true` if `owner` holds the lease afterwards.
pub async fn try_acquire(
    pool: &SqlitePool,
    name: &str,
    owner: &str,
    now: DateTime<Utc>,
    stale_before: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO leases (name, owner_token, renewed_at)
        VALUES (?, ?, ?)
        ON CONFLICT(name) DO UPDATE
        SET owner_token = excluded.owner_token, renewed_at = excluded.renewed_at
        WHERE leases.owner_token = excluded.owner_token OR leases.renewed_at < ?
        "#,
    )
    .bind(name)
    .bind(owner)
    .bind(now)
    .bind(stale_before)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Refresh `renewed_at` if `owner` still holds the lease.
pub async fn renew(pool: &SqlitePool, name: &str, owner: &str, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE leases SET renewed_at = ?
        WHERE name = ? AND owner_token = ?
        "#,
    )
    .bind(now)
    .bind(name)
    .bind(owner)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Give the lease up so another process can take it immediately.
pub async fn release(pool: &SqlitePool, name: &str, owner: &str) -> Result<()> {
    sqlx::query(
        r#"
        DELETE FROM leases WHERE name = ? AND owner_token = ?
        "#,
    )
    .bind(name)
    .bind(owner)
    .execute(pool)
    .await?;

    Ok(())
}
