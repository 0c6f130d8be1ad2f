//! Bounded, TTL-evicting "seen" caches.
//!
//! The duplicate filter talks to [`SeenCache`] only, so the in-process
//! [`TtlCache`] can be replaced by a shared store without touching callers.

use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A set of recently seen keys.
#[async_trait]
pub trait SeenCache: Send + Sync {
    /// Record `key` and report whether it was already present.
    ///
    /// Expired entries count as absent.
    async fn check_and_insert(&self, key: &str) -> bool;
}

/// In-process cache keyed by string, ordered by insertion time.
///
/// Every entry has the same TTL, so expired entries always sit at the
/// front and eviction stops at the first live one.
#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<IndexMap<String, Instant>>,
}

impl TtlCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn check_and_insert_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;

        while let Some((_, &seen_at)) = entries.first() {
            if now.duration_since(seen_at) >= self.ttl {
                entries.shift_remove_index(0);
            } else {
                break;
            }
        }

        if entries.contains_key(key) {
            return true;
        }

        while entries.len() >= self.max_entries {
            entries.shift_remove_index(0);
        }
        entries.insert(key.to_string(), now);
        false
    }
}

#[async_trait]
impl SeenCache for TtlCache {
    async fn check_and_insert(&self, key: &str) -> bool {
        self.check_and_insert_at(key, Instant::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_repeat_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60), 100);

        assert!(!cache.check_and_insert("a").await);
        assert!(cache.check_and_insert("a").await);
        assert!(!cache.check_and_insert("b").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let cache = TtlCache::new(Duration::from_secs(60), 100);
        cache.check_and_insert("a").await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.check_and_insert("a").await);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!cache.check_and_insert("a").await);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.check_and_insert("a").await;
        cache.check_and_insert("b").await;
        cache.check_and_insert("c").await;

        assert_eq!(cache.len().await, 2);
        // Oldest entry was evicted to make room.
        assert!(!cache.check_and_insert("a").await);
    }
}
