//! Database models.

use std::fmt;
use std::str::FromStr;

use brain_core::Sentiment;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Messaging platform a user talks to the bot on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Platform {
    WhatsApp,
    Telegram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::WhatsApp => "whatsapp",
            Platform::Telegram => "telegram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "whatsapp" => Ok(Platform::WhatsApp),
            "telegram" => Ok(Platform::Telegram),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// Whether a bot participates in scheduled delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BotStatus {
    Active,
    Inactive,
}

/// Journey status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Completed,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Direction of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// How often a bot delivers the next day of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryInterval {
    /// A fixed number of minutes since the previous delivery.
    EveryMinutes { minutes: u32 },
    /// Once per local day, at or after `time` in `timezone`.
    DailyAt { timezone: Tz, time: NaiveTime },
}

/// Where a video lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoSource {
    /// A stored media file reference.
    Ref(String),
    /// An external URL.
    Url(String),
}

/// Media attached to a day of content.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentMedia {
    #[default]
    Text,
    Image { reference: String },
    Video { source: VideoSource },
    Audio { reference: String },
}

/// Message templates a bot answers commands with.
///
/// Missing keys fall back to the defaults, so bots only store overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotTemplates {
    pub welcome: String,
    pub help: String,
    pub stop: String,
    pub not_subscribed: String,
    pub human_handoff: String,
    pub handoff_offer: String,
    pub handoff_declined: String,
    pub completion: String,
    pub completed_offer: String,
    pub voice_error: String,
    pub unsupported_media: String,
    pub apology: String,
    pub fallback_reply: String,
    pub delivery_fallback: String,
}

impl Default for BotTemplates {
    fn default() -> Self {
        Self {
            welcome: "Welcome! Your journey begins shortly. Your first message will arrive in a moment."
                .to_string(),
            help: "Available commands:\n\u{2022} START - Begin or restart your journey\n\u{2022} STOP - Unsubscribe from messages\n\u{2022} HELP - Show this help message\n\u{2022} HUMAN - Talk to a person\n\nYou can also reply to any message to share your thoughts."
                .to_string(),
            stop: "You have been unsubscribed. We're sorry to see you go. Send START anytime to begin again."
                .to_string(),
            not_subscribed: "You weren't subscribed. Send START to begin your journey.".to_string(),
            human_handoff: "Thank you for reaching out. Someone from our team will connect with you soon."
                .to_string(),
            handoff_offer: "It sounds like a lot is on your mind. Would you like to talk with someone from our team?"
                .to_string(),
            handoff_declined: "No problem. I'm here whenever you want to keep talking.".to_string(),
            completion: "Congratulations, you have completed the journey! Send START anytime to begin again."
                .to_string(),
            completed_offer: "If you'd like to talk with someone from our team, reply HUMAN.".to_string(),
            voice_error: "Sorry, I could not understand your voice message. Could you send it as text?"
                .to_string(),
            unsupported_media: "Sorry, I can only read text messages right now. Please send your message as text."
                .to_string(),
            apology: "Sorry, there was an error processing your message. Please try again or type HELP for assistance."
                .to_string(),
            fallback_reply: "Thank you for sharing. I'm reflecting on your message and will be here when you're ready to continue."
                .to_string(),
            delivery_fallback: "Message received. Reply whenever you're ready.".to_string(),
        }
    }
}

/// One configured program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Bot {
    pub id: i64,
    pub name: String,
    pub status: BotStatus,
    pub journey_length_days: i64,
    #[sqlx(json)]
    pub delivery_interval: DeliveryInterval,
    #[sqlx(json)]
    pub templates: BotTemplates,
    /// AI persona / system prompt.
    pub persona: String,
    /// Language name used for AI replies and speech (e.g. "English").
    pub language: String,
    /// Platform credentials, opaque to everything but the platform adapter.
    #[sqlx(json)]
    pub credentials: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBot {
    pub name: String,
    pub journey_length_days: i64,
    pub delivery_interval: DeliveryInterval,
    pub templates: BotTemplates,
    pub persona: String,
    pub language: String,
    pub credentials: serde_json::Value,
}

impl NewBot {
    /// A bot with default templates and no credentials.
    pub fn new(name: impl Into<String>, journey_length_days: i64, delivery_interval: DeliveryInterval) -> Self {
        Self {
            name: name.into(),
            journey_length_days,
            delivery_interval,
            templates: BotTemplates::default(),
            persona: String::new(),
            language: "English".to_string(),
            credentials: serde_json::json!({}),
        }
    }
}

/// One day's payload for a bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Content {
    pub id: i64,
    pub bot_id: i64,
    pub day_number: i64,
    pub title: String,
    pub body: String,
    pub reflection_prompt: Option<String>,
    #[sqlx(json)]
    pub media: ContentMedia,
    pub is_active: bool,
}

/// Fields required to create content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContent {
    pub bot_id: i64,
    pub day_number: i64,
    pub title: String,
    pub body: String,
    pub reflection_prompt: Option<String>,
    pub media: ContentMedia,
}

/// A conversation participant, unique per `(bot_id, sender_key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub bot_id: i64,
    pub platform: Platform,
    /// Canonical platform identity (digits-only phone, or `tg_{chat_id}`).
    pub sender_key: String,
    pub status: UserStatus,
    pub current_day: i64,
    pub join_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    #[sqlx(json)]
    pub tags: Vec<String>,
    pub display_name: Option<String>,
    pub locale: Option<String>,
    pub source_ip: Option<String>,
    /// Set while a human-connection offer awaits the user's answer.
    pub awaiting_handoff_choice: bool,
}

impl User {
    /// The journey-relevant part of the row.
    pub fn journey_state(&self) -> JourneyState {
        JourneyState {
            status: self.status,
            current_day: self.current_day,
            join_date: self.join_date,
            completion_date: self.completion_date,
        }
    }
}

/// Fields required to create a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub bot_id: i64,
    pub platform: Platform,
    pub sender_key: String,
    pub status: UserStatus,
    pub display_name: Option<String>,
    pub locale: Option<String>,
    pub source_ip: Option<String>,
    pub join_date: DateTime<Utc>,
}

/// The `(status, current_day)` pair plus its timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyState {
    pub status: UserStatus,
    pub current_day: i64,
    pub join_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
}

/// An inbound or outbound message record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MessageLog {
    pub id: i64,
    pub user_id: i64,
    pub direction: Direction,
    pub raw_text: String,
    pub sentiment: Option<Sentiment>,
    /// Tags produced by the statistical pass alone.
    #[sqlx(json)]
    pub classifier_tags: Vec<String>,
    /// Final merged tag set.
    #[sqlx(json)]
    pub tags: Vec<String>,
    pub confidence: Option<f64>,
    pub is_human_handoff: bool,
    /// User's journey day when the message was logged.
    pub journey_day: Option<i64>,
    /// Day number, for scheduled content deliveries only.
    pub content_day: Option<i64>,
    pub tags_merged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to append a message log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessageLog {
    pub user_id: i64,
    pub direction: Direction,
    pub raw_text: String,
    pub tags: Vec<String>,
    pub is_human_handoff: bool,
    pub journey_day: Option<i64>,
    pub content_day: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl NewMessageLog {
    pub fn incoming(user_id: i64, raw_text: impl Into<String>, journey_day: i64, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            direction: Direction::Incoming,
            raw_text: raw_text.into(),
            tags: Vec::new(),
            is_human_handoff: false,
            journey_day: Some(journey_day),
            content_day: None,
            created_at: at,
        }
    }

    pub fn outgoing(user_id: i64, raw_text: impl Into<String>, journey_day: i64, at: DateTime<Utc>) -> Self {
        Self {
            direction: Direction::Outgoing,
            ..Self::incoming(user_id, raw_text, journey_day, at)
        }
    }

    /// Mark this row as a human handoff.
    pub fn handoff(mut self) -> Self {
        self.is_human_handoff = true;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Result of the classification pipeline written onto an incoming row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMerge {
    pub sentiment: Sentiment,
    pub classifier_tags: Vec<String>,
    pub tags: Vec<String>,
    pub confidence: f64,
}

/// WHEN part of a tag rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleTrigger {
    MessageReceived,
    UserDayReached { day: i64 },
    SentimentDetected { sentiment: Sentiment },
    TagApplied { tag: String },
}

/// IF part of a tag rule. All conditions must hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    ContainsKeyword { keyword: String },
    SentimentIs { sentiment: Sentiment },
    UserDayIs { day: i64 },
    TagExists { tag: String },
    UserDayGreaterThan { day: i64 },
    UserDayLessThan { day: i64 },
}

/// THEN part of a tag rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    ApplyTag { tag: String },
    RemoveTag { tag: String },
}

/// A declarative When/If/Then tagging rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TagRule {
    pub id: i64,
    /// `None` applies the rule to every bot.
    pub bot_id: Option<i64>,
    pub name: String,
    #[sqlx(json)]
    pub trigger: RuleTrigger,
    #[sqlx(json)]
    pub conditions: Vec<RuleCondition>,
    #[sqlx(json)]
    pub actions: Vec<RuleAction>,
    pub priority: i64,
    pub is_active: bool,
}

/// Fields required to create a tag rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTagRule {
    pub bot_id: Option<i64>,
    pub name: String,
    pub trigger: RuleTrigger,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
    pub priority: i64,
}

/// A named lease row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LeaseRecord {
    pub name: String,
    pub owner_token: String,
    pub renewed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_json() {
        let every: DeliveryInterval = serde_json::from_str(r#"{"kind":"every_minutes","minutes":10}"#).unwrap();
        assert_eq!(every, DeliveryInterval::EveryMinutes { minutes: 10 });

        let daily: DeliveryInterval =
            serde_json::from_str(r#"{"kind":"daily_at","timezone":"Asia/Jakarta","time":"08:30:00"}"#).unwrap();
        assert_eq!(
            daily,
            DeliveryInterval::DailyAt {
                timezone: chrono_tz::Asia::Jakarta,
                time: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            }
        );
    }

    #[test]
    fn test_media_json() {
        let video: ContentMedia =
            serde_json::from_str(r#"{"kind":"video","source":{"url":"https://cdn.example/v.mp4"}}"#).unwrap();
        assert_eq!(
            video,
            ContentMedia::Video {
                source: VideoSource::Url("https://cdn.example/v.mp4".to_string())
            }
        );
        assert!(serde_json::from_str::<ContentMedia>(r#"{"kind":"gif"}"#).is_err());
    }

    #[test]
    fn test_templates_partial_override() {
        let templates: BotTemplates = serde_json::from_str(r#"{"welcome":"Hi!"}"#).unwrap();
        assert_eq!(templates.welcome, "Hi!");
        assert_eq!(templates.stop, BotTemplates::default().stop);
    }

    #[test]
    fn test_rule_json() {
        let trigger: RuleTrigger =
            serde_json::from_str(r#"{"type":"sentiment_detected","sentiment":"negative"}"#).unwrap();
        assert_eq!(
            trigger,
            RuleTrigger::SentimentDetected {
                sentiment: Sentiment::Negative
            }
        );
    }
}
