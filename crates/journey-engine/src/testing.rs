//! Shared fixtures for the engine's tests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use brain_core::Classifier;
use chrono::Utc;
use database::{bot, content, user, Bot, ContentMedia, Database, DeliveryInterval, NewBot, NewContent, NewUser, Platform, User, UserStatus};
use mock_brain::{EchoResponder, FixedClassifier, ScriptedSpeech};

use crate::config::{EngineConfig, RetryPolicy};
use crate::engine::Engine;
use crate::sender::RecordingSender;

pub(crate) async fn test_db() -> Database {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
    db.migrate().await.unwrap();
    db
}

/// No waiting anywhere, so background tasks finish promptly.
pub(crate) fn fast_config() -> EngineConfig {
    EngineConfig {
        first_content_delay: Duration::ZERO,
        reflection_delay: Duration::ZERO,
        collaborator_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            fallback_min_chars: 1000,
        },
        ..EngineConfig::default()
    }
}

pub(crate) fn engine(db: &Database, sender: Arc<RecordingSender>) -> Engine {
    engine_with(db, sender, Arc::new(FixedClassifier::default()), ScriptedSpeech::broken())
}

pub(crate) fn engine_with(
    db: &Database,
    sender: Arc<RecordingSender>,
    classifier: Arc<dyn Classifier>,
    speech: ScriptedSpeech,
) -> Engine {
    Engine::new(
        db.pool().clone(),
        sender,
        Arc::new(EchoResponder::with_prefix("AI: ")),
        classifier,
        Arc::new(speech),
        fast_config(),
    )
}

pub(crate) async fn seed_bot(db: &Database, journey_length: i64) -> Bot {
    bot::create_bot(
        db.pool(),
        &NewBot::new("Test Bot", journey_length, DeliveryInterval::EveryMinutes { minutes: 10 }),
    )
    .await
    .unwrap()
}

pub(crate) async fn seed_content(db: &Database, bot_id: i64, days: impl IntoIterator<Item = i64>) {
    for day in days {
        content::create_content(
            db.pool(),
            &NewContent {
                bot_id,
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
}

/// An active user already on `day`.
pub(crate) async fn seed_user(db: &Database, bot_id: i64, sender_key: &str, day: i64) -> User {
    let created = user::create_user(
        db.pool(),
        &NewUser {
            bot_id,
            platform: Platform::WhatsApp,
            sender_key: sender_key.to_string(),
            status: UserStatus::Active,
            display_name: None,
            locale: None,
            source_ip: None,
            join_date: Utc::now(),
        },
    )
    .await
    .unwrap();

    let current = created.journey_state();
    let moved = database::JourneyState {
        current_day: day,
        ..current
    };
    assert!(user::compare_and_set_state(db.pool(), created.id, &current, &moved)
        .await
        .unwrap());
    user::get_user(db.pool(), created.id).await.unwrap()
}

/// Poll until `check` holds, for work done by detached tasks.
pub(crate) async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
