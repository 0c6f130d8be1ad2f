//! Classification pipeline: statistical pass, rule pass, single write.

use std::time::Duration;

use brain_core::{Analysis, Classifier};
use chrono::{DateTime, Utc};
use database::{bot, message_log, tag_rule, user, Direction, MessageLog, TagMerge, User};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::classify;
use crate::error::{EngineError, Result};
use crate::rules::{self, RuleContext};

/// Tag carried by every handoff message.
pub const HUMAN_HANDOFF_TAG: &str = "HUMAN_HANDOFF";

/// Tags that follow from the row itself rather than from classification.
fn system_tags(message: &MessageLog) -> Vec<String> {
    if message.is_human_handoff {
        vec![HUMAN_HANDOFF_TAG.to_string()]
    } else {
        Vec::new()
    }
}

/// Run the rule pass over a statistical result and build the merged set.
async fn merge_for(
    pool: &SqlitePool,
    message: &MessageLog,
    owner: &User,
    analysis: &Analysis,
) -> Result<TagMerge> {
    let rules = tag_rule::list_active_rules(pool, owner.bot_id).await?;

    let context = RuleContext {
        direction: message.direction,
        text: &message.raw_text,
        sentiment: analysis.sentiment,
        message_tags: &analysis.tags,
        user_day: message.journey_day.unwrap_or(owner.current_day),
        user_tags: &owner.tags,
    };
    let outcome = rules::evaluate(&rules, &context);

    let mut base = system_tags(message);
    base.extend(analysis.tags.iter().cloned());

    Ok(TagMerge {
        sentiment: analysis.sentiment,
        classifier_tags: analysis.tags.clone(),
        tags: rules::merge(&base, &outcome),
        confidence: analysis.confidence,
    })
}

/// Classify an incoming message and write its tags, once.
///
/// A row that was already merged keeps its tags. The merged tags are also
/// accumulated on the user.
pub async fn tag_incoming(
    pool: &SqlitePool,
    classifier: &dyn Classifier,
    limit: Duration,
    message_id: i64,
    now: DateTime<Utc>,
) -> Result<TagMerge> {
    let message = message_log::get_message(pool, message_id).await?;
    let owner = user::get_user(pool, message.user_id).await?;

    let analysis = classify::analyze(classifier, &message.raw_text, limit).await;
    let merge = merge_for(pool, &message, &owner, &analysis).await?;

    if message_log::record_tag_merge(pool, message_id, &merge, now).await? {
        user::merge_tags(pool, owner.id, &merge.tags).await?;
        debug!("Message {} tagged {:?}", message_id, merge.tags);
    } else {
        debug!("Message {} already tagged, keeping stored tags", message_id);
    }

    Ok(merge)
}

/// Re-run tagging for one stored incoming message.
///
/// With `reclassify` the statistical pass runs again; otherwise the stored
/// statistical result is reused, so repeated runs with the same rules
/// produce the same tags.
pub async fn retag_message(
    pool: &SqlitePool,
    classifier: &dyn Classifier,
    limit: Duration,
    message_id: i64,
    reclassify: bool,
    now: DateTime<Utc>,
) -> Result<TagMerge> {
    let message = message_log::get_message(pool, message_id).await?;
    if message.direction != Direction::Incoming {
        return Err(EngineError::InvalidRequest(format!(
            "message {} is not an incoming message",
            message_id
        )));
    }
    let owner = user::get_user(pool, message.user_id).await?;

    let analysis = match (reclassify, message.sentiment) {
        (false, Some(sentiment)) => Analysis::new(
            sentiment,
            message.classifier_tags.clone(),
            message.confidence.unwrap_or_default(),
        ),
        _ => classify::analyze(classifier, &message.raw_text, limit).await,
    };

    let merge = merge_for(pool, &message, &owner, &analysis).await?;
    message_log::retag_message(pool, message_id, &merge, now).await?;

    Ok(merge)
}

/// Summary of a bot-wide re-tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RetagReport {
    pub retagged: usize,
    pub failed: usize,
}

/// Re-tag every incoming message of a bot.
///
/// Failures are counted and logged; the batch continues.
pub async fn retag_bot(
    pool: &SqlitePool,
    classifier: &dyn Classifier,
    limit: Duration,
    bot_id: i64,
    reclassify: bool,
    now: DateTime<Utc>,
) -> Result<RetagReport> {
    bot::get_bot(pool, bot_id).await?;
    let ids = message_log::list_incoming_ids_for_bot(pool, bot_id).await?;

    let mut report = RetagReport::default();
    for id in ids {
        match retag_message(pool, classifier, limit, id, reclassify, now).await {
            Ok(_) => report.retagged += 1,
            Err(e) => {
                warn!("Re-tag of message {} failed: {}", id, e);
                report.failed += 1;
            }
        }
    }

    info!(
        "Re-tagged bot {}: {} messages, {} failures",
        bot_id, report.retagged, report.failed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{
        Database, DeliveryInterval, NewBot, NewMessageLog, NewTagRule, NewUser, Platform,
        RuleAction, RuleCondition, RuleTrigger, UserStatus,
    };
    use brain_core::Sentiment;
    use mock_brain::{FailingClassifier, FixedClassifier};

    async fn setup() -> (Database, User) {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();
        let b = bot::create_bot(
            db.pool(),
            &NewBot::new("Bot", 5, DeliveryInterval::EveryMinutes { minutes: 10 }),
        )
        .await
        .unwrap();
        let u = user::create_user(
            db.pool(),
            &NewUser {
                bot_id: b.id,
                platform: Platform::WhatsApp,
                sender_key: "6281".to_string(),
                status: UserStatus::Active,
                display_name: None,
                locale: None,
                source_ip: None,
                join_date: Utc::now(),
            },
        )
        .await
        .unwrap();
        (db, u)
    }

    async fn add_rule(db: &Database, bot_id: i64, keyword: &str, tag: &str) {
        tag_rule::create_rule(
            db.pool(),
            &NewTagRule {
                bot_id: Some(bot_id),
                name: format!("{} rule", tag),
                trigger: RuleTrigger::MessageReceived,
                conditions: vec![RuleCondition::ContainsKeyword {
                    keyword: keyword.to_string(),
                }],
                actions: vec![RuleAction::ApplyTag { tag: tag.to_string() }],
                priority: 1,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_tag_incoming_merges_once() {
        let (db, u) = setup().await;
        add_rule(&db, u.bot_id, "pray", "Prayer Request").await;

        let id = message_log::append(
            db.pool(),
            &NewMessageLog::incoming(u.id, "Please pray for my family", 1, Utc::now()),
        )
        .await
        .unwrap();

        let classifier = FixedClassifier::with(Sentiment::Negative, &["Family"], 0.8);
        let merge = tag_incoming(db.pool(), &classifier, Duration::from_secs(1), id, Utc::now())
            .await
            .unwrap();
        assert_eq!(merge.tags, vec!["Family".to_string(), "Prayer Request".to_string()]);

        let stored = message_log::get_message(db.pool(), id).await.unwrap();
        assert_eq!(stored.tags, merge.tags);
        assert_eq!(stored.classifier_tags, vec!["Family".to_string()]);
        assert_eq!(stored.sentiment, Some(Sentiment::Negative));

        // A second run does not overwrite the row.
        let other = FixedClassifier::with(Sentiment::Positive, &["Other"], 0.9);
        tag_incoming(db.pool(), &other, Duration::from_secs(1), id, Utc::now())
            .await
            .unwrap();
        let stored = message_log::get_message(db.pool(), id).await.unwrap();
        assert_eq!(stored.classifier_tags, vec!["Family".to_string()]);

        let owner = user::get_user(db.pool(), u.id).await.unwrap();
        assert!(owner.tags.contains(&"Prayer Request".to_string()));
    }

    #[tokio::test]
    async fn test_handoff_tag_survives_merge() {
        let (db, u) = setup().await;
        let id = message_log::append(
            db.pool(),
            &NewMessageLog::incoming(u.id, "I need help", 2, Utc::now())
                .handoff()
                .with_tags(vec![HUMAN_HANDOFF_TAG.to_string()]),
        )
        .await
        .unwrap();

        let merge = tag_incoming(db.pool(), &FailingClassifier, Duration::from_secs(1), id, Utc::now())
            .await
            .unwrap();
        assert_eq!(merge.tags[0], HUMAN_HANDOFF_TAG);
    }

    #[tokio::test]
    async fn test_retag_is_idempotent() {
        let (db, u) = setup().await;
        let id = message_log::append(
            db.pool(),
            &NewMessageLog::incoming(u.id, "I doubt this", 2, Utc::now()),
        )
        .await
        .unwrap();
        let classifier = FixedClassifier::with(Sentiment::Negative, &["Doubt"], 0.7);
        tag_incoming(db.pool(), &classifier, Duration::from_secs(1), id, Utc::now())
            .await
            .unwrap();

        add_rule(&db, u.bot_id, "doubt", "Seeker").await;

        let first = retag_message(db.pool(), &FailingClassifier, Duration::from_secs(1), id, false, Utc::now())
            .await
            .unwrap();
        let second = retag_message(db.pool(), &FailingClassifier, Duration::from_secs(1), id, false, Utc::now())
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.tags, vec!["Doubt".to_string(), "Seeker".to_string()]);

        let report = retag_bot(db.pool(), &classifier, Duration::from_secs(1), u.bot_id, true, Utc::now())
            .await
            .unwrap();
        assert_eq!(report, RetagReport { retagged: 1, failed: 0 });
    }
}
