//! Command and conversation handlers.

use brain_core::{DayContext, ReplyRequest, Sentiment};
use chrono::Utc;
use database::{content, message_log, user, Bot, DatabaseError, NewMessageLog, NewUser, TagMerge, User, UserStatus};
use platform_client::ReplyButton;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::delivery::{DeliveryMode, DeliveryReport};
use crate::engine::{Engine, Handled};
use crate::error::Result;
use crate::journey::{self, JourneyEvent};
use crate::normalizer::InboundMessage;
use crate::sender::Target;
use crate::tagging::{self, HUMAN_HANDOFF_TAG};

/// Button ID for accepting a human-connection offer.
pub const HANDOFF_ACCEPT: &str = "handoff_accept";

/// Button ID for declining a human-connection offer.
pub const HANDOFF_DECLINE: &str = "handoff_decline";

/// Keywords that suggest the user would rather talk to a person.
const OFFER_KEYWORDS: &[&str] = &[
    "doubt",
    "confused",
    "angry",
    "help me",
    "talk to someone",
    "need support",
];

/// Negative messages at or above this confidence trigger an offer.
const OFFER_MIN_CONFIDENCE: f64 = 0.7;

/// Whether a mid-journey message should get a human-connection offer
/// instead of an automated reply.
pub fn needs_handoff_offer(text: &str, merge: &TagMerge) -> bool {
    if merge.sentiment == Sentiment::Negative && merge.confidence >= OFFER_MIN_CONFIDENCE {
        return true;
    }
    offer_keyword(text)
}

fn offer_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    OFFER_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// A pending offer answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferChoice {
    Accept,
    Decline,
}

/// Read an answer to a pending offer. Anything else is `None`.
pub fn parse_offer_choice(text: &str) -> Option<OfferChoice> {
    match text.trim().to_lowercase().as_str() {
        HANDOFF_ACCEPT | "accept" | "yes" | "y" => Some(OfferChoice::Accept),
        HANDOFF_DECLINE | "decline" | "no" | "n" => Some(OfferChoice::Decline),
        _ => None,
    }
}

fn display_name(user: &User) -> &str {
    user.display_name.as_deref().unwrap_or(&user.sender_key)
}

impl Engine {
    fn new_user(msg: &InboundMessage, status: UserStatus) -> NewUser {
        NewUser {
            bot_id: msg.bot_id,
            platform: msg.platform,
            sender_key: msg.sender_key.clone(),
            status,
            display_name: msg.profile.display_name.clone(),
            locale: msg.profile.locale.clone(),
            source_ip: msg.source_ip.clone(),
            join_date: Utc::now(),
        }
    }

    /// Create the user, or return the row a concurrent request created.
    async fn ensure_user(&self, msg: &InboundMessage, status: UserStatus) -> Result<(User, bool)> {
        match user::create_user(&self.pool, &Self::new_user(msg, status)).await {
            Ok(created) => {
                info!(bot_id = msg.bot_id, sender = %msg.sender_key, "Created user {}", created.id);
                Ok((created, true))
            }
            Err(DatabaseError::AlreadyExists { .. }) => {
                let found = user::find_user(&self.pool, msg.bot_id, &msg.sender_key)
                    .await?
                    .ok_or_else(|| DatabaseError::NotFound {
                        entity: "User",
                        id: msg.sender_key.clone(),
                    })?;
                Ok((found, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn log_incoming(&self, user: &User, msg: &InboundMessage, handoff: bool) -> Result<i64> {
        let mut entry = NewMessageLog::incoming(user.id, msg.text.clone(), user.current_day, Utc::now());
        if handoff {
            entry = entry.handoff().with_tags(vec![HUMAN_HANDOFF_TAG.to_string()]);
        }
        Ok(message_log::append(&self.pool, &entry).await?)
    }

    /// Deliver a reply and log what reached the user.
    pub(crate) async fn reply(
        &self,
        bot: &Bot,
        target: &Target,
        recipient: Option<&User>,
        text: &str,
        mode: DeliveryMode,
    ) -> DeliveryReport {
        let report = self.delivery.send(bot, target, text, mode).await;

        if let (Some(recipient), Some(sent)) = (recipient, report.sent_text.as_deref()) {
            if let Err(e) = message_log::append(
                &self.pool,
                &NewMessageLog::outgoing(recipient.id, sent, recipient.current_day, Utc::now()),
            )
            .await
            {
                warn!(user_id = recipient.id, "Failed to log reply: {}", e);
            }
        }

        report
    }

    /// Tag an incoming row. Failures are logged and leave the row for a
    /// later re-tag; they never fail the request.
    async fn tag(&self, message_id: i64) -> Option<TagMerge> {
        match tagging::tag_incoming(
            &self.pool,
            self.classifier.as_ref(),
            self.config.collaborator_timeout,
            message_id,
            Utc::now(),
        )
        .await
        {
            Ok(merge) => Some(merge),
            Err(e) => {
                warn!("Tagging message {} failed: {}", message_id, e);
                None
            }
        }
    }

    /// AI reply, or the bot's fallback text if the responder fails.
    async fn ai_reply(&self, bot: &Bot, recipient: &User, text: &str, context: Option<DayContext>) -> String {
        let mut request = ReplyRequest::general(display_name(recipient), &bot.persona, text, &bot.language);
        if let Some(context) = context {
            request = request.with_context(context);
        }

        match timeout(self.config.collaborator_timeout, self.responder.reply(request)).await {
            Ok(Ok(reply)) if !reply.trim().is_empty() => reply,
            Ok(Ok(_)) => {
                warn!("Responder {} returned an empty reply", self.responder.name());
                bot.templates.fallback_reply.clone()
            }
            Ok(Err(e)) => {
                warn!("Responder {} failed: {}", self.responder.name(), e);
                bot.templates.fallback_reply.clone()
            }
            Err(_) => {
                warn!("Responder {} timed out", self.responder.name());
                bot.templates.fallback_reply.clone()
            }
        }
    }

    /// Deliver day 1 after the configured delay, off the request path.
    fn schedule_first_day(&self, bot: Bot, user_id: i64) {
        let engine = self.clone();
        let delay = self.config.first_content_delay;

        tokio::spawn(async move {
            sleep(delay).await;
            match engine.deliver_day(&bot, user_id, Some(1)).await {
                Ok(outcome) => debug!("First-day delivery for user {}: {:?}", user_id, outcome),
                Err(e) => warn!("First-day delivery for user {} failed: {}", user_id, e),
            }
        });
    }

    pub(crate) async fn handle_start(
        &self,
        bot: &Bot,
        target: &Target,
        msg: &InboundMessage,
        existing: Option<User>,
    ) -> Result<Handled> {
        let started = match existing {
            Some(current) => {
                journey::transition(&self.pool, current.id, JourneyEvent::Start, Utc::now()).await?;
                user::set_awaiting_handoff(&self.pool, current.id, false).await?;
                user::get_user(&self.pool, current.id).await?
            }
            None => {
                let (created, fresh) = self.ensure_user(msg, UserStatus::Active).await?;
                if fresh {
                    created
                } else {
                    journey::transition(&self.pool, created.id, JourneyEvent::Start, Utc::now()).await?;
                    user::get_user(&self.pool, created.id).await?
                }
            }
        };

        info!(bot_id = bot.id, user_id = started.id, "Journey started");
        self.log_incoming(&started, msg, false).await?;
        self.reply(bot, target, Some(&started), &bot.templates.welcome, DeliveryMode::Text)
            .await;
        self.schedule_first_day(bot.clone(), started.id);

        Ok(Handled::Started)
    }

    pub(crate) async fn handle_stop(
        &self,
        bot: &Bot,
        target: &Target,
        msg: &InboundMessage,
        existing: Option<User>,
    ) -> Result<Handled> {
        let Some(current) = existing else {
            self.reply(bot, target, None, &bot.templates.not_subscribed, DeliveryMode::Text)
                .await;
            return Ok(Handled::NotSubscribed);
        };

        self.log_incoming(&current, msg, false).await?;
        let transition = journey::transition(&self.pool, current.id, JourneyEvent::Stop, Utc::now()).await?;

        if transition.applied() {
            info!(bot_id = bot.id, user_id = current.id, "Journey stopped on day {}", current.current_day);
            self.reply(bot, target, Some(&current), &bot.templates.stop, DeliveryMode::Text)
                .await;
            Ok(Handled::Stopped)
        } else {
            self.reply(bot, target, Some(&current), &bot.templates.not_subscribed, DeliveryMode::Text)
                .await;
            Ok(Handled::NotSubscribed)
        }
    }

    pub(crate) async fn handle_help(
        &self,
        bot: &Bot,
        target: &Target,
        msg: &InboundMessage,
        existing: Option<User>,
    ) -> Result<Handled> {
        if let Some(current) = &existing {
            self.log_incoming(current, msg, false).await?;
        }
        self.reply(bot, target, existing.as_ref(), &bot.templates.help, DeliveryMode::Text)
            .await;
        Ok(Handled::Help)
    }

    /// Escalate to a person. Unknown senders get an inactive record so the
    /// request is on file.
    pub(crate) async fn handle_handoff(
        &self,
        bot: &Bot,
        target: &Target,
        msg: &InboundMessage,
        existing: Option<User>,
    ) -> Result<Handled> {
        let current = match existing {
            Some(current) => current,
            None => self.ensure_user(msg, UserStatus::Inactive).await?.0,
        };

        let id = self.log_incoming(&current, msg, true).await?;
        if current.awaiting_handoff_choice {
            user::set_awaiting_handoff(&self.pool, current.id, false).await?;
        }
        info!(bot_id = bot.id, user_id = current.id, "Human handoff requested");

        self.reply(bot, target, Some(&current), &bot.templates.human_handoff, DeliveryMode::Text)
            .await;
        self.tag(id).await;

        Ok(Handled::Handoff)
    }

    pub(crate) async fn handle_choice(
        &self,
        bot: &Bot,
        target: &Target,
        msg: &InboundMessage,
        current: User,
    ) -> Result<Handled> {
        match parse_offer_choice(&msg.text) {
            Some(OfferChoice::Accept) => self.handle_handoff(bot, target, msg, Some(current)).await,
            Some(OfferChoice::Decline) => {
                self.log_incoming(&current, msg, false).await?;
                user::set_awaiting_handoff(&self.pool, current.id, false).await?;
                self.reply(bot, target, Some(&current), &bot.templates.handoff_declined, DeliveryMode::Text)
                    .await;
                Ok(Handled::HandoffDeclined)
            }
            None => {
                let id = self.log_incoming(&current, msg, false).await?;
                self.tag(id).await;
                debug!("User {} has a pending offer; message logged only", current.id);
                Ok(Handled::AwaitingChoice)
            }
        }
    }

    pub(crate) async fn handle_first_contact(
        &self,
        bot: &Bot,
        target: &Target,
        msg: &InboundMessage,
    ) -> Result<Handled> {
        let (created, fresh) = self.ensure_user(msg, UserStatus::Active).await?;

        let id = self.log_incoming(&created, msg, false).await?;
        self.reply(bot, target, Some(&created), &bot.templates.welcome, DeliveryMode::Text)
            .await;
        if fresh {
            self.schedule_first_day(bot.clone(), created.id);
        }
        self.tag(id).await;

        Ok(Handled::FirstContact)
    }

    pub(crate) async fn handle_completed(
        &self,
        bot: &Bot,
        target: &Target,
        msg: &InboundMessage,
        current: User,
        mode: DeliveryMode,
    ) -> Result<Handled> {
        let id = self.log_incoming(&current, msg, false).await?;
        self.tag(id).await;

        let reply = self.ai_reply(bot, &current, &msg.text, None).await;
        let text = format!("{}\n\n{}", reply, bot.templates.completed_offer);
        self.reply(bot, target, Some(&current), &text, mode).await;

        Ok(Handled::Completed)
    }

    pub(crate) async fn handle_contextual(
        &self,
        bot: &Bot,
        target: &Target,
        msg: &InboundMessage,
        current: User,
        mode: DeliveryMode,
    ) -> Result<Handled> {
        let id = self.log_incoming(&current, msg, false).await?;
        let offer = match self.tag(id).await {
            Some(merge) => needs_handoff_offer(&msg.text, &merge),
            None => offer_keyword(&msg.text),
        };

        if offer {
            let buttons = [
                ReplyButton::new(HANDOFF_ACCEPT, "Yes, connect me"),
                ReplyButton::new(HANDOFF_DECLINE, "No, thanks"),
            ];
            if self
                .delivery
                .send_buttons(bot, target, &bot.templates.handoff_offer, &buttons)
                .await
            {
                user::set_awaiting_handoff(&self.pool, current.id, true).await?;
                info!(bot_id = bot.id, user_id = current.id, "Offered human connection");
                if let Err(e) = message_log::append(
                    &self.pool,
                    &NewMessageLog::outgoing(current.id, bot.templates.handoff_offer.clone(), current.current_day, Utc::now()),
                )
                .await
                {
                    warn!(user_id = current.id, "Failed to log handoff offer: {}", e);
                }
                return Ok(Handled::HandoffOffered);
            }
            warn!(bot_id = bot.id, user_id = current.id, "Handoff offer undelivered, replying instead");
        }

        let context = content::latest_content_up_to(&self.pool, bot.id, current.current_day)
            .await?
            .map(|c| DayContext {
                day_number: c.day_number,
                title: c.title,
                body: c.body,
                reflection_prompt: c.reflection_prompt,
            });

        let reply = self.ai_reply(bot, &current, &msg.text, context).await;
        self.reply(bot, target, Some(&current), &reply, mode).await;

        Ok(Handled::Contextual)
    }

    pub(crate) async fn handle_general(
        &self,
        bot: &Bot,
        target: &Target,
        msg: &InboundMessage,
        current: User,
        mode: DeliveryMode,
    ) -> Result<Handled> {
        let id = self.log_incoming(&current, msg, false).await?;
        self.tag(id).await;

        let reply = self.ai_reply(bot, &current, &msg.text, None).await;
        self.reply(bot, target, Some(&current), &reply, mode).await;

        Ok(Handled::General)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(sentiment: Sentiment, confidence: f64) -> TagMerge {
        TagMerge {
            sentiment,
            classifier_tags: Vec::new(),
            tags: Vec::new(),
            confidence,
        }
    }

    #[test]
    fn test_offer_gate() {
        assert!(needs_handoff_offer("this is awful", &merge(Sentiment::Negative, 0.8)));
        assert!(!needs_handoff_offer("this is awful", &merge(Sentiment::Negative, 0.6)));
        assert!(needs_handoff_offer("I'm so confused", &merge(Sentiment::Neutral, 0.2)));
        assert!(!needs_handoff_offer("thank you", &merge(Sentiment::Positive, 0.9)));
    }

    #[test]
    fn test_offer_choice() {
        assert_eq!(parse_offer_choice("handoff_accept"), Some(OfferChoice::Accept));
        assert_eq!(parse_offer_choice(" Yes "), Some(OfferChoice::Accept));
        assert_eq!(parse_offer_choice("NO"), Some(OfferChoice::Decline));
        assert_eq!(parse_offer_choice("maybe later"), None);
    }
}
