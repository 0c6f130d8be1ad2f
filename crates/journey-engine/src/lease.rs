//! Single-owner scheduler lease.
//!
//! At most one process runs the scheduler's work at a time. The holder
//! renews the lease as it works; a lease not renewed within the staleness
//! window may be taken over by anyone.

use chrono::{DateTime, Duration, Utc};
use database::{lease, LeaseRecord};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::Result;

/// What a process should do about a lease it wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseDecision {
    /// Free or stale: take it.
    Acquire,
    /// Already ours: refresh it.
    Renew,
    /// Held by someone else who renewed recently.
    Skip,
}

/// Decide how to treat `current` when `owner` wants the lease at `now`.
pub fn decide(current: Option<&LeaseRecord>, owner: &str, now: DateTime<Utc>, staleness: Duration) -> LeaseDecision {
    match current {
        None => LeaseDecision::Acquire,
        Some(held) if held.owner_token == owner => LeaseDecision::Renew,
        Some(held) if now - held.renewed_at > staleness => LeaseDecision::Acquire,
        Some(_) => LeaseDecision::Skip,
    }
}

/// A named lease held on behalf of this process.
#[derive(Debug, Clone)]
pub struct LeaseCoordinator {
    name: String,
    owner_token: String,
    staleness: Duration,
}

impl LeaseCoordinator {
    /// A coordinator with a fresh random owner token.
    pub fn new(name: impl Into<String>, staleness: std::time::Duration) -> Self {
        Self::with_owner(name, uuid::Uuid::new_v4().to_string(), staleness)
    }

    pub fn with_owner(name: impl Into<String>, owner_token: impl Into<String>, staleness: std::time::Duration) -> Self {
        Self {
            name: name.into(),
            owner_token: owner_token.into(),
            staleness: Duration::from_std(staleness).unwrap_or(Duration::seconds(30)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_token(&self) -> &str {
        &self.owner_token
    }

    /// Try to hold the lease. Returns `true` if this process holds it.
    pub async fn acquire(&self, pool: &SqlitePool, now: DateTime<Utc>) -> Result<bool> {
        let current = lease::get_lease(pool, &self.name).await?;

        match decide(current.as_ref(), &self.owner_token, now, self.staleness) {
            LeaseDecision::Skip => {
                debug!("Lease {} held by another process", self.name);
                Ok(false)
            }
            LeaseDecision::Renew => self.renew(pool, now).await,
            LeaseDecision::Acquire => {
                let won = lease::try_acquire(pool, &self.name, &self.owner_token, now, now - self.staleness).await?;
                if won {
                    info!("Acquired lease {} as {}", self.name, self.owner_token);
                } else {
                    debug!("Lost race for lease {}", self.name);
                }
                Ok(won)
            }
        }
    }

    /// Refresh the lease. Returns `false` if another process took it.
    pub async fn renew(&self, pool: &SqlitePool, now: DateTime<Utc>) -> Result<bool> {
        Ok(lease::renew(pool, &self.name, &self.owner_token, now).await?)
    }

    pub async fn release(&self, pool: &SqlitePool) -> Result<()> {
        lease::release(pool, &self.name, &self.owner_token).await?;
        info!("Released lease {}", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::Database;

    fn record(owner: &str, renewed_at: DateTime<Utc>) -> LeaseRecord {
        LeaseRecord {
            name: "scheduler".to_string(),
            owner_token: owner.to_string(),
            renewed_at,
        }
    }

    #[test]
    fn test_decide() {
        let now = Utc::now();
        let staleness = Duration::seconds(30);

        assert_eq!(decide(None, "a", now, staleness), LeaseDecision::Acquire);
        assert_eq!(
            decide(Some(&record("a", now - Duration::seconds(5))), "a", now, staleness),
            LeaseDecision::Renew
        );
        assert_eq!(
            decide(Some(&record("b", now - Duration::seconds(5))), "a", now, staleness),
            LeaseDecision::Skip
        );
        assert_eq!(
            decide(Some(&record("b", now - Duration::seconds(31))), "a", now, staleness),
            LeaseDecision::Acquire
        );
    }

    #[tokio::test]
    async fn test_one_holder_at_a_time() {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        let staleness = std::time::Duration::from_secs(30);

        let first = LeaseCoordinator::with_owner("scheduler", "first", staleness);
        let second = LeaseCoordinator::with_owner("scheduler", "second", staleness);
        let now = Utc::now();

        assert!(first.acquire(db.pool(), now).await.unwrap());
        assert!(!second.acquire(db.pool(), now + Duration::seconds(10)).await.unwrap());
        assert!(first.acquire(db.pool(), now + Duration::seconds(20)).await.unwrap());

        // First stops renewing; second takes over once it is stale.
        let later = now + Duration::seconds(60);
        assert!(second.acquire(db.pool(), later).await.unwrap());
        assert!(!first.renew(db.pool(), later).await.unwrap());

        second.release(db.pool()).await.unwrap();
        assert!(first.acquire(db.pool(), later).await.unwrap());
    }
}
