//! Two-layer duplicate filter.
//!
//! 1. Platform message IDs, remembered for a few minutes, absorb webhook
//!    redelivery.
//! 2. A hash of `(bot, sender, normalized text)`, remembered for a short
//!    window and backed by the durable message log, absorbs the same
//!    human-typed message arriving at two workers at once.
//!
//! Both layers may miss; neither may drop a distinct message, so text is
//! compared exactly after whitespace normalization.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use database::{message_log, Platform};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::debug;

use crate::cache::{SeenCache, TtlCache};
use crate::config::EngineConfig;
use crate::error::Result;

/// Trim and collapse runs of whitespace. Case is kept.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable key for the content layer.
pub fn content_key(bot_id: i64, sender_key: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bot_id.to_be_bytes());
    hasher.update([0]);
    hasher.update(sender_key.as_bytes());
    hasher.update([0]);
    hasher.update(normalize_text(text).as_bytes());
    hex::encode(hasher.finalize())
}

/// Duplicate filter with injected caches.
#[derive(Clone)]
pub struct DuplicateFilter {
    ids: Arc<dyn SeenCache>,
    contents: Arc<dyn SeenCache>,
    content_window: Duration,
}

impl DuplicateFilter {
    /// In-process caches sized from configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_caches(
            Arc::new(TtlCache::new(config.dedup_id_ttl, config.dedup_max_entries)),
            Arc::new(TtlCache::new(
                config.dedup_content_ttl,
                config.dedup_max_entries,
            )),
            config.dedup_content_ttl,
        )
    }

    pub fn with_caches(
        ids: Arc<dyn SeenCache>,
        contents: Arc<dyn SeenCache>,
        content_window: Duration,
    ) -> Self {
        Self {
            ids,
            contents,
            content_window,
        }
    }

    /// Webhook-ID layer. Messages without an ID always pass.
    pub async fn is_repeat_id(&self, bot_id: i64, platform: Platform, external_id: Option<&str>) -> bool {
        let Some(id) = external_id else {
            return false;
        };

        let key = format!("{}:{}:{}", bot_id, platform, id);
        let seen = self.ids.check_and_insert(&key).await;
        if seen {
            debug!("Dropping redelivered message {}", key);
        }
        seen
    }

    /// In-memory half of the content layer.
    pub async fn is_repeat_content(&self, bot_id: i64, sender_key: &str, text: &str) -> bool {
        let seen = self
            .contents
            .check_and_insert(&content_key(bot_id, sender_key, text))
            .await;
        if seen {
            debug!("Dropping repeated text from {} (cache)", sender_key);
        }
        seen
    }

    /// Durable half of the content layer: an identical incoming row from
    /// this user inside the window.
    ///
    /// Must run before the current message is logged.
    pub async fn is_logged_recently(
        &self,
        pool: &SqlitePool,
        user_id: i64,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let window = chrono::Duration::from_std(self.content_window)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let seen = message_log::has_recent_incoming(pool, user_id, text, now - window).await?;
        if seen {
            debug!("Dropping repeated text from user {} (log)", user_id);
        }
        Ok(seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello \n  world\t"), "Hello world");
        assert_eq!(normalize_text("Hello"), "Hello");
    }

    #[test]
    fn test_content_key_exact() {
        let a = content_key(1, "6281", "I feel  peace");
        assert_eq!(a, content_key(1, "6281", " I feel peace "));
        assert_ne!(a, content_key(1, "6281", "i feel peace"));
        assert_ne!(a, content_key(2, "6281", "I feel peace"));
        assert_ne!(a, content_key(1, "6282", "I feel peace"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_id_layer() {
        let filter = DuplicateFilter::new(&EngineConfig::default());

        assert!(!filter.is_repeat_id(1, Platform::WhatsApp, Some("wamid.1")).await);
        assert!(filter.is_repeat_id(1, Platform::WhatsApp, Some("wamid.1")).await);
        // Same ID on another bot is a different message.
        assert!(!filter.is_repeat_id(2, Platform::WhatsApp, Some("wamid.1")).await);
        assert!(!filter.is_repeat_id(1, Platform::WhatsApp, None).await);
        assert!(!filter.is_repeat_id(1, Platform::WhatsApp, None).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_layer_window() {
        let filter = DuplicateFilter::new(&EngineConfig::default());

        assert!(!filter.is_repeat_content(1, "6281", "amen").await);
        assert!(filter.is_repeat_content(1, "6281", " amen ").await);
        assert!(!filter.is_repeat_content(1, "6281", "Amen").await);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!filter.is_repeat_content(1, "6281", "amen").await);
    }
}
