//! SQLite persistence layer for the journey engine.
//!
//! This crate provides async operations for bots, day content, users,
//! the message log, tag rules and scheduler leases using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use database::{bot, user, Database, DeliveryInterval, NewBot, NewUser, Platform, UserStatus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:journey.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let created = bot::create_bot(
//!         db.pool(),
//!         &NewBot::new("Daily Reflections", 30, DeliveryInterval::EveryMinutes { minutes: 1440 }),
//!     )
//!     .await?;
//!
//!     user::create_user(
//!         db.pool(),
//!         &NewUser {
//!             bot_id: created.id,
//!             platform: Platform::WhatsApp,
//!             sender_key: "6281234567890".to_string(),
//!             status: UserStatus::Active,
//!             display_name: Some("Rina".to_string()),
//!             locale: None,
//!             source_ip: None,
//!             join_date: Utc::now(),
//!         },
//!     )
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod content;
pub mod error;
pub mod lease;
pub mod message_log;
pub mod models;
pub mod tag_rule;
pub mod user;

pub use error::{DatabaseError, Result};
pub use models::{
    Bot, BotStatus, BotTemplates, Content, ContentMedia, DeliveryInterval, Direction,
    JourneyState, LeaseRecord, MessageLog, NewBot, NewContent, NewMessageLog, NewTagRule,
    NewUser, Platform, RuleAction, RuleCondition, RuleTrigger, TagMerge, TagRule, User,
    UserStatus, VideoSource,
};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    /// Set high enough to handle concurrent webhook processing and the scheduler.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/journey.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing, use a single connection)
    /// let db = database::Database::connect_with_pool_size("sqlite::memory:", 1).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_core::Sentiment;
    use chrono::{Duration, Utc};

    async fn test_db() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();
        db
    }

    async fn test_bot(db: &Database) -> Bot {
        bot::create_bot(
            db.pool(),
            &NewBot::new("Test Bot", 3, DeliveryInterval::EveryMinutes { minutes: 10 }),
        )
        .await
        .unwrap()
    }

    fn new_user(bot_id: i64, sender_key: &str) -> NewUser {
        NewUser {
            bot_id,
            platform: Platform::WhatsApp,
            sender_key: sender_key.to_string(),
            status: UserStatus::Active,
            display_name: Some("Alice".to_string()),
            locale: Some("en".to_string()),
            source_ip: None,
            join_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_bot_roundtrip() {
        let db = test_db().await;
        let created = test_bot(&db).await;

        let fetched = bot::get_bot(db.pool(), created.id).await.unwrap();
        assert_eq!(fetched.name, "Test Bot");
        assert_eq!(fetched.delivery_interval, DeliveryInterval::EveryMinutes { minutes: 10 });
        assert_eq!(fetched.templates, BotTemplates::default());

        assert_eq!(bot::list_active_bots(db.pool()).await.unwrap().len(), 1);
        bot::set_bot_status(db.pool(), created.id, BotStatus::Inactive)
            .await
            .unwrap();
        assert!(bot::list_active_bots(db.pool()).await.unwrap().is_empty());

        let missing = bot::get_bot(db.pool(), 999).await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_last_delivery() {
        let db = test_db().await;
        let b = test_bot(&db).await;

        assert!(bot::last_delivery_at(db.pool(), b.id).await.unwrap().is_none());

        let first = Utc::now();
        bot::record_delivery(db.pool(), b.id, first).await.unwrap();
        let later = first + Duration::minutes(10);
        bot::record_delivery(db.pool(), b.id, later).await.unwrap();

        let stored = bot::last_delivery_at(db.pool(), b.id).await.unwrap().unwrap();
        assert_eq!(stored, later);
    }

    #[tokio::test]
    async fn test_content_lookup() {
        let db = test_db().await;
        let b = test_bot(&db).await;

        for day in [1, 3] {
            content::create_content(
                db.pool(),
                &NewContent {
                    bot_id: b.id,
                    day_number: day,
                    title: format!("Title {}", day),
                    body: format!("Body {}", day),
                    reflection_prompt: None,
                    media: ContentMedia::Text,
                },
            )
            .await
            .unwrap();
        }

        assert!(content::get_content(db.pool(), b.id, 2).await.unwrap().is_none());
        let latest = content::latest_content_up_to(db.pool(), b.id, 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.day_number, 1);
        assert_eq!(content::missing_days(db.pool(), b.id, 3).await.unwrap(), vec![2]);

        let duplicate = content::create_content(
            db.pool(),
            &NewContent {
                bot_id: b.id,
                day_number: 1,
                title: "Again".to_string(),
                body: String::new(),
                reflection_prompt: None,
                media: ContentMedia::Text,
            },
        )
        .await;
        assert!(matches!(duplicate, Err(DatabaseError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_user_unique_per_bot() {
        let db = test_db().await;
        let b = test_bot(&db).await;

        let created = user::create_user(db.pool(), &new_user(b.id, "15551234567"))
            .await
            .unwrap();
        assert_eq!(created.status, UserStatus::Active);
        assert_eq!(created.current_day, 1);
        assert!(created.tags.is_empty());

        let again = user::create_user(db.pool(), &new_user(b.id, "15551234567")).await;
        assert!(matches!(again, Err(DatabaseError::AlreadyExists { .. })));

        let found = user::find_user(db.pool(), b.id, "15551234567").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_compare_and_set_state() {
        let db = test_db().await;
        let b = test_bot(&db).await;
        let u = user::create_user(db.pool(), &new_user(b.id, "15550000001"))
            .await
            .unwrap();

        let expected = u.journey_state();
        let next = JourneyState {
            current_day: 2,
            ..expected
        };

        assert!(user::compare_and_set_state(db.pool(), u.id, &expected, &next)
            .await
            .unwrap());
        // A second writer holding the stale state loses.
        assert!(!user::compare_and_set_state(db.pool(), u.id, &expected, &next)
            .await
            .unwrap());

        let fetched = user::get_user(db.pool(), u.id).await.unwrap();
        assert_eq!(fetched.current_day, 2);
    }

    #[tokio::test]
    async fn test_merge_user_tags() {
        let db = test_db().await;
        let b = test_bot(&db).await;
        let u = user::create_user(db.pool(), &new_user(b.id, "15550000002"))
            .await
            .unwrap();

        user::merge_tags(db.pool(), u.id, &["Doubt".to_string()]).await.unwrap();
        let tags = user::merge_tags(db.pool(), u.id, &["Question".to_string(), "Doubt".to_string()])
            .await
            .unwrap();
        assert_eq!(tags, vec!["Doubt".to_string(), "Question".to_string()]);
    }

    #[tokio::test]
    async fn test_message_log_merge_once() {
        let db = test_db().await;
        let b = test_bot(&db).await;
        let u = user::create_user(db.pool(), &new_user(b.id, "15550000003"))
            .await
            .unwrap();

        let now = Utc::now();
        let id = message_log::append(db.pool(), &NewMessageLog::incoming(u.id, "hello", 1, now))
            .await
            .unwrap();

        let merge = TagMerge {
            sentiment: Sentiment::Positive,
            classifier_tags: vec!["Greeting".to_string()],
            tags: vec!["Greeting".to_string(), "Engaged".to_string()],
            confidence: 0.9,
        };
        assert!(message_log::record_tag_merge(db.pool(), id, &merge, now).await.unwrap());

        let other = TagMerge {
            tags: vec!["Other".to_string()],
            ..merge.clone()
        };
        assert!(!message_log::record_tag_merge(db.pool(), id, &other, now).await.unwrap());

        let stored = message_log::get_message(db.pool(), id).await.unwrap();
        assert_eq!(stored.tags, merge.tags);
        assert_eq!(stored.sentiment, Some(Sentiment::Positive));
        assert_eq!(stored.direction, Direction::Incoming);

        message_log::retag_message(db.pool(), id, &other, now).await.unwrap();
        let stored = message_log::get_message(db.pool(), id).await.unwrap();
        assert_eq!(stored.tags, vec!["Other".to_string()]);
    }

    #[tokio::test]
    async fn test_recent_incoming_and_day_delivery() {
        let db = test_db().await;
        let b = test_bot(&db).await;
        let u = user::create_user(db.pool(), &new_user(b.id, "15550000004"))
            .await
            .unwrap();

        let now = Utc::now();
        message_log::append(db.pool(), &NewMessageLog::incoming(u.id, "amen", 1, now))
            .await
            .unwrap();

        let window_start = now - Duration::seconds(60);
        assert!(message_log::has_recent_incoming(db.pool(), u.id, "amen", window_start)
            .await
            .unwrap());
        assert!(!message_log::has_recent_incoming(db.pool(), u.id, "Amen", window_start)
            .await
            .unwrap());
        assert!(!message_log::has_recent_incoming(
            db.pool(),
            u.id,
            "amen",
            now + Duration::seconds(1)
        )
        .await
        .unwrap());

        let mut delivery = NewMessageLog::outgoing(u.id, "Day 1: Hello", 1, now)
            .with_tags(vec!["day:1".to_string()]);
        delivery.content_day = Some(1);
        message_log::append(db.pool(), &delivery).await.unwrap();

        assert!(message_log::has_day_delivery(db.pool(), u.id, 1, u.join_date - Duration::seconds(1))
            .await
            .unwrap());
        assert!(!message_log::has_day_delivery(db.pool(), u.id, 2, u.join_date - Duration::seconds(1))
            .await
            .unwrap());

        let ids = message_log::list_incoming_ids_for_bot(db.pool(), b.id).await.unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn test_rules_ordered_by_priority() {
        let db = test_db().await;
        let b = test_bot(&db).await;

        for (name, priority, bot_id) in [("low", 1, Some(b.id)), ("high", 10, None), ("mid", 5, Some(b.id))] {
            tag_rule::create_rule(
                db.pool(),
                &NewTagRule {
                    bot_id,
                    name: name.to_string(),
                    trigger: RuleTrigger::MessageReceived,
                    conditions: vec![],
                    actions: vec![RuleAction::ApplyTag {
                        tag: name.to_string(),
                    }],
                    priority,
                },
            )
            .await
            .unwrap();
        }

        let rules = tag_rule::list_active_rules(db.pool(), b.id).await.unwrap();
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);

        tag_rule::set_rule_active(db.pool(), rules[0].id, false).await.unwrap();
        assert_eq!(tag_rule::list_active_rules(db.pool(), b.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_lease_exclusion_and_takeover() {
        let db = test_db().await;
        let now = Utc::now();
        let staleness = Duration::seconds(30);

        assert!(lease::try_acquire(db.pool(), "scheduler", "a", now, now - staleness)
            .await
            .unwrap());
        // Fresh lease held by "a": "b" is refused.
        assert!(!lease::try_acquire(db.pool(), "scheduler", "b", now, now - staleness)
            .await
            .unwrap());
        // "a" may re-acquire its own lease.
        assert!(lease::try_acquire(db.pool(), "scheduler", "a", now, now - staleness)
            .await
            .unwrap());

        // After the staleness window "b" takes over and "a" can no longer renew.
        let later = now + Duration::seconds(31);
        assert!(lease::try_acquire(db.pool(), "scheduler", "b", later, later - staleness)
            .await
            .unwrap());
        assert!(!lease::renew(db.pool(), "scheduler", "a", later).await.unwrap());
        assert!(lease::renew(db.pool(), "scheduler", "b", later).await.unwrap());

        let held = lease::get_lease(db.pool(), "scheduler").await.unwrap().unwrap();
        assert_eq!(held.owner_token, "b");

        lease::release(db.pool(), "scheduler", "b").await.unwrap();
        assert!(lease::get_lease(db.pool(), "scheduler").await.unwrap().is_none());
    }
}
