//! Delivery of one day of content to one user.

use chrono::Utc;
use database::{content, message_log, user, Bot, Content, ContentMedia, NewMessageLog, UserStatus, VideoSource};
use platform_client::MediaKind;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::delivery::DeliveryMode;
use crate::engine::Engine;
use crate::error::Result;
use crate::journey::{self, JourneyEvent};
use crate::sender::Target;

/// What happened when delivering a day to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOutcome {
    /// Sent and advanced; `completed` if it was the final day.
    Delivered { day: i64, completed: bool },
    /// Already delivered since the user joined; advanced without resending.
    AlreadyDelivered { day: i64 },
    /// No active content for the day; nothing changed.
    Gap { day: i64 },
    /// Every send attempt failed; nothing changed.
    Failed { day: i64 },
    /// Past the last day; marked completed.
    Completed,
    /// Not active, or no longer on the expected day.
    Skipped,
}

/// Text of a day message.
pub fn format_day(content: &Content) -> String {
    format!("Day {}: {}\n\n{}", content.day_number, content.title, content.body)
}

/// Public URL for a stored media reference.
pub fn media_url(reference: &str, base_url: Option<&str>) -> Option<String> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Some(reference.to_string());
    }
    base_url.map(|base| {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            reference.trim_start_matches('/')
        )
    })
}

/// Media kind and URL for a day's attachment, if it has one.
pub fn media_for(media: &ContentMedia, base_url: Option<&str>) -> Option<(MediaKind, String)> {
    match media {
        ContentMedia::Text => None,
        ContentMedia::Image { reference } => media_url(reference, base_url).map(|u| (MediaKind::Image, u)),
        ContentMedia::Video {
            source: VideoSource::Ref(reference),
        } => media_url(reference, base_url).map(|u| (MediaKind::Video, u)),
        ContentMedia::Video {
            source: VideoSource::Url(url),
        } => Some((MediaKind::Video, url.clone())),
        ContentMedia::Audio { reference } => media_url(reference, base_url).map(|u| (MediaKind::Audio, u)),
    }
}

impl Engine {
    /// Deliver the user's current day and advance them.
    ///
    /// With `expected_day`, nothing happens unless the user is still on
    /// that day. The user only advances after a confirmed send, through
    /// a conditional write.
    pub async fn deliver_day(&self, bot: &Bot, user_id: i64, expected_day: Option<i64>) -> Result<DayOutcome> {
        let recipient = user::get_user(&self.pool, user_id).await?;

        if recipient.status != UserStatus::Active {
            return Ok(DayOutcome::Skipped);
        }
        if expected_day.is_some_and(|d| d != recipient.current_day) {
            return Ok(DayOutcome::Skipped);
        }

        let day = recipient.current_day;
        let journey_length = bot.journey_length_days;

        if day > journey_length {
            let transition = journey::transition(&self.pool, user_id, JourneyEvent::Complete, Utc::now()).await?;
            if transition.applied() {
                info!(bot_id = bot.id, user_id, "Marked completed past day {}", journey_length);
            }
            return Ok(DayOutcome::Completed);
        }

        let Some(day_content) = content::get_content(&self.pool, bot.id, day).await? else {
            warn!(bot_id = bot.id, user_id, "No content for day {}, skipping", day);
            return Ok(DayOutcome::Gap { day });
        };

        let event = JourneyEvent::DayDelivered { day, journey_length };

        if message_log::has_day_delivery(&self.pool, user_id, day, recipient.join_date).await? {
            info!(bot_id = bot.id, user_id, "Day {} already sent, advancing only", day);
            journey::transition(&self.pool, user_id, event, Utc::now()).await?;
            return Ok(DayOutcome::AlreadyDelivered { day });
        }

        let target = Target::new(recipient.platform, recipient.sender_key.clone());
        let report = self
            .delivery
            .send(bot, &target, &format_day(&day_content), DeliveryMode::Text)
            .await;
        let Some(sent) = report.sent_text.filter(|_| report.delivered) else {
            warn!(bot_id = bot.id, user_id, "Day {} delivery failed", day);
            return Ok(DayOutcome::Failed { day });
        };

        let mut entry = NewMessageLog::outgoing(user_id, sent, day, Utc::now()).with_tags(vec![format!("day:{}", day)]);
        entry.content_day = Some(day);
        message_log::append(&self.pool, &entry).await?;

        if let Some((kind, url)) = media_for(&day_content.media, self.config.media_base_url.as_deref()) {
            if !self.delivery.send_media(bot, &target, kind, &url, None).await {
                warn!(bot_id = bot.id, user_id, "Media for day {} not delivered", day);
            }
        } else if day_content.media != ContentMedia::Text {
            warn!(bot_id = bot.id, "Media for day {} has no resolvable URL", day);
        }

        let transition = journey::transition(&self.pool, user_id, event, Utc::now()).await?;
        if !transition.applied() {
            debug!("User {} advanced concurrently past day {}", user_id, day);
            return Ok(DayOutcome::AlreadyDelivered { day });
        }

        let completed = transition.state().status == UserStatus::Completed;
        if completed {
            info!(bot_id = bot.id, user_id, "Journey completed");
            let advanced = user::get_user(&self.pool, user_id).await?;
            self.reply(bot, &target, Some(&advanced), &bot.templates.completion, DeliveryMode::Text)
                .await;
        } else if let Some(prompt) = day_content.reflection_prompt.clone() {
            self.schedule_reflection(bot.clone(), user_id, day, prompt);
        }

        Ok(DayOutcome::Delivered { day, completed })
    }

    /// Send a day's reflection prompt after the configured delay.
    fn schedule_reflection(&self, bot: Bot, user_id: i64, day: i64, prompt: String) {
        let engine = self.clone();
        let delay = self.config.reflection_delay;

        tokio::spawn(async move {
            sleep(delay).await;

            let recipient = match user::get_user(&engine.pool, user_id).await {
                Ok(u) if u.status == UserStatus::Active => u,
                Ok(_) => return,
                Err(e) => {
                    warn!("Reflection prompt for user {} skipped: {}", user_id, e);
                    return;
                }
            };

            let target = Target::new(recipient.platform, recipient.sender_key.clone());
            let report = engine
                .reply(&bot, &target, Some(&recipient), &prompt, DeliveryMode::Text)
                .await;
            if !report.delivered {
                warn!("Reflection prompt for day {} to user {} was not delivered", day, user_id);
            }
        });
    }
}
