//! The engine: inbound processing entry points.
//!
//! ```text
//! webhook ─► normalize ─► screen (message ID) ─► spawn ─► process
//!                                                          │
//!                       transcribe voice ◄─────────────────┤
//!                       content dedup (cache, then log) ◄──┤
//!                       route ─► handler ─► delivery ◄─────┘
//! ```
//!
//! Only normalization and the ID screen run on the webhook request path.

use std::sync::Arc;

use brain_core::{Classifier, Responder, Speech};
use chrono::Utc;
use database::{bot, Bot, BotStatus, DatabaseError, Platform};
use sqlx::SqlitePool;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::dedup::DuplicateFilter;
use crate::delivery::{DeliveryAdapter, DeliveryMode};
use crate::error::{EngineError, Result};
use crate::language::speech_language_code;
use crate::normalizer::{InboundMessage, Normalized, VoiceNote};
use crate::router::{self, Command, JourneyRoute, Route};
use crate::sender::{PlatformSender, Target};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled(Handled),
    /// Absorbed by the duplicate filter.
    Duplicate,
    /// Not processed at all (unknown or inactive bot, empty text).
    Dropped,
}

/// Which handler answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Started,
    Stopped,
    NotSubscribed,
    Help,
    Handoff,
    HandoffOffered,
    HandoffDeclined,
    /// Logged while an offer is pending; no reply.
    AwaitingChoice,
    FirstContact,
    Completed,
    Contextual,
    General,
    VoiceError,
    Unsupported,
    /// An internal error; the user got the apology.
    Apology,
}

/// Inbound message processor.
///
/// Cheap to clone; background tasks hold their own clone.
#[derive(Clone)]
pub struct Engine {
    pub(crate) pool: SqlitePool,
    pub(crate) responder: Arc<dyn Responder>,
    pub(crate) classifier: Arc<dyn Classifier>,
    pub(crate) speech: Arc<dyn Speech>,
    pub(crate) delivery: DeliveryAdapter,
    pub(crate) filter: DuplicateFilter,
    pub(crate) config: Arc<EngineConfig>,
}

impl Engine {
    pub fn new(
        pool: SqlitePool,
        sender: Arc<dyn PlatformSender>,
        responder: Arc<dyn Responder>,
        classifier: Arc<dyn Classifier>,
        speech: Arc<dyn Speech>,
        config: EngineConfig,
    ) -> Self {
        let delivery = DeliveryAdapter::new(
            sender,
            speech.clone(),
            config.retry.clone(),
            config.collaborator_timeout,
        );
        let filter = DuplicateFilter::new(&config);

        Self {
            pool,
            responder,
            classifier,
            speech,
            delivery,
            filter,
            config: Arc::new(config),
        }
    }

    /// Replace the duplicate filter, e.g. with one backed by a shared cache.
    pub fn with_filter(mut self, filter: DuplicateFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn delivery(&self) -> &DeliveryAdapter {
        &self.delivery
    }

    /// Webhook-ID layer. Returns `true` if the event should be processed.
    pub async fn screen(&self, normalized: &Normalized) -> bool {
        match normalized {
            Normalized::Message(msg) => !self
                .filter
                .is_repeat_id(msg.bot_id, msg.platform, msg.external_id.as_deref())
                .await,
            Normalized::Unsupported {
                bot_id,
                platform,
                external_id,
                ..
            } => !self
                .filter
                .is_repeat_id(*bot_id, *platform, external_id.as_deref())
                .await,
            Normalized::Ignored => false,
        }
    }

    /// Screen an event and hand it to a background task.
    ///
    /// Returns once the event is queued, never waiting on collaborators.
    pub async fn dispatch(&self, normalized: Normalized) {
        if !self.screen(&normalized).await {
            return;
        }

        let engine = self.clone();
        tokio::spawn(async move {
            let outcome = match normalized {
                Normalized::Message(msg) => engine.process(msg).await,
                Normalized::Unsupported {
                    bot_id,
                    platform,
                    sender_key,
                    ..
                } => engine.process_unsupported(bot_id, platform, &sender_key).await,
                Normalized::Ignored => Outcome::Dropped,
            };
            debug!("Inbound outcome: {:?}", outcome);
        });
    }

    /// Load an active bot, or `None` if it is missing or disabled.
    pub(crate) async fn active_bot(&self, bot_id: i64) -> Result<Option<Bot>> {
        match bot::get_bot(&self.pool, bot_id).await {
            Ok(b) if b.status == BotStatus::Active => Ok(Some(b)),
            Ok(_) => Ok(None),
            Err(DatabaseError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reply to media the engine cannot read.
    pub async fn process_unsupported(&self, bot_id: i64, platform: Platform, sender_key: &str) -> Outcome {
        let bot = match self.active_bot(bot_id).await {
            Ok(Some(b)) => b,
            Ok(None) => return Outcome::Dropped,
            Err(e) => {
                error!("Failed to load bot {}: {}", bot_id, e);
                return Outcome::Dropped;
            }
        };

        let target = Target::new(platform, sender_key);
        self.delivery
            .send(&bot, &target, &bot.templates.unsupported_media, DeliveryMode::Text)
            .await;
        Outcome::Handled(Handled::Unsupported)
    }

    async fn transcribe(&self, bot: &Bot, platform: Platform, voice: &VoiceNote) -> Result<String> {
        let limit = self.config.collaborator_timeout;
        let sender = self.delivery.sender();

        let media = timeout(limit, sender.fetch_media(bot, platform, &voice.media_id))
            .await
            .map_err(|_| EngineError::MediaFailed("download timed out".to_string()))??;

        let mime_type = if media.mime_type.is_empty() {
            voice.mime_type.as_str()
        } else {
            media.mime_type.as_str()
        };

        let text = timeout(
            limit,
            self.speech
                .transcribe(media.bytes, mime_type, speech_language_code(&bot.language)),
        )
        .await
        .map_err(|_| brain_core::BrainError::Timeout)??;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(brain_core::BrainError::InvalidResponse("empty transcript".to_string()).into());
        }
        Ok(text)
    }

    /// Process one screened message end to end.
    ///
    /// Errors never escape: they are logged and the user gets the bot's
    /// apology.
    pub async fn process(&self, mut msg: InboundMessage) -> Outcome {
        let bot = match self.active_bot(msg.bot_id).await {
            Ok(Some(b)) => b,
            Ok(None) => {
                debug!("Dropping message for inactive bot {}", msg.bot_id);
                return Outcome::Dropped;
            }
            Err(e) => {
                error!("Failed to load bot {}: {}", msg.bot_id, e);
                return Outcome::Dropped;
            }
        };
        let target = Target::new(msg.platform, msg.sender_key.clone());

        let mut mode = DeliveryMode::Text;
        if let Some(voice) = msg.voice.take() {
            match self.transcribe(&bot, msg.platform, &voice).await {
                Ok(text) => {
                    info!(bot_id = bot.id, sender = %msg.sender_key, "Transcribed voice note");
                    msg.text = text;
                    mode = DeliveryMode::Voice;
                }
                Err(e) => {
                    warn!(bot_id = bot.id, sender = %msg.sender_key, "Voice note failed: {}", e);
                    self.delivery
                        .send(&bot, &target, &bot.templates.voice_error, DeliveryMode::Text)
                        .await;
                    return Outcome::Handled(Handled::VoiceError);
                }
            }
        }

        if msg.text.is_empty() {
            return Outcome::Dropped;
        }

        if self
            .filter
            .is_repeat_content(bot.id, &msg.sender_key, &msg.text)
            .await
        {
            return Outcome::Duplicate;
        }

        match self.handle(&bot, &target, &msg, mode).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(bot_id = bot.id, sender = %msg.sender_key, "Failed to handle message: {}", e);
                self.delivery
                    .send(&bot, &target, &bot.templates.apology, DeliveryMode::Text)
                    .await;
                Outcome::Handled(Handled::Apology)
            }
        }
    }

    async fn handle(&self, bot: &Bot, target: &Target, msg: &InboundMessage, mode: DeliveryMode) -> Result<Outcome> {
        let existing = database::user::find_user(&self.pool, bot.id, &msg.sender_key).await?;

        if let Some(user) = &existing {
            if self
                .filter
                .is_logged_recently(&self.pool, user.id, &msg.text, Utc::now())
                .await?
            {
                return Ok(Outcome::Duplicate);
            }
        }

        let route = router::route(&msg.text, &self.config.handoff_phrases);
        debug!("Routing {:?} for {} on bot {}", route, msg.sender_key, bot.id);

        let handled = match route {
            Route::Command(Command::Start) => self.handle_start(bot, target, msg, existing).await?,
            Route::Command(Command::Stop) => self.handle_stop(bot, target, msg, existing).await?,
            Route::Command(Command::Help) => self.handle_help(bot, target, msg, existing).await?,
            Route::Command(Command::Human) | Route::Handoff => {
                self.handle_handoff(bot, target, msg, existing).await?
            }
            Route::JourneyContent => match existing {
                None => self.handle_first_contact(bot, target, msg).await?,
                Some(user) if user.awaiting_handoff_choice => {
                    self.handle_choice(bot, target, msg, user).await?
                }
                Some(user) => match router::journey_route(Some(&user), bot.journey_length_days) {
                    JourneyRoute::Completed => {
                        self.handle_completed(bot, target, msg, user, mode).await?
                    }
                    JourneyRoute::Contextual => {
                        self.handle_contextual(bot, target, msg, user, mode).await?
                    }
                    JourneyRoute::FirstContact | JourneyRoute::General => {
                        self.handle_general(bot, target, msg, user, mode).await?
                    }
                },
            },
        };

        Ok(Outcome::Handled(handled))
    }
}
