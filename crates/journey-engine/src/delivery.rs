//! Outbound delivery with retry, backoff and fallbacks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use brain_core::Speech;
use database::Bot;
use platform_client::{MediaKind, ReplyButton};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::error::Result;
use crate::language::speech_language_code;
use crate::sender::{PlatformSender, Target};

/// How the user receives a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Text,
    Voice,
}

/// Result of [`DeliveryAdapter::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: bool,
    pub mode: DeliveryMode,
    /// What actually reached the user: the content, or the short fallback.
    pub sent_text: Option<String>,
}

impl DeliveryReport {
    fn failed() -> Self {
        Self {
            delivered: false,
            mode: DeliveryMode::Text,
            sent_text: None,
        }
    }
}

/// Platform-agnostic send operation.
#[derive(Clone)]
pub struct DeliveryAdapter {
    sender: Arc<dyn PlatformSender>,
    speech: Arc<dyn Speech>,
    policy: RetryPolicy,
    speech_timeout: Duration,
}

impl DeliveryAdapter {
    pub fn new(
        sender: Arc<dyn PlatformSender>,
        speech: Arc<dyn Speech>,
        policy: RetryPolicy,
        speech_timeout: Duration,
    ) -> Self {
        Self {
            sender,
            speech,
            policy,
            speech_timeout,
        }
    }

    pub fn sender(&self) -> &Arc<dyn PlatformSender> {
        &self.sender
    }

    /// Run `op` up to `max_attempts` times with doubling backoff.
    async fn with_retry<F, Fut>(&self, what: &str, target: &Target, mut op: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            match op().await {
                Ok(()) => {
                    if attempt > 1 {
                        info!("{} to {} succeeded on attempt {}", what, target.sender_key, attempt);
                    }
                    return true;
                }
                Err(e) => {
                    warn!(
                        "{} to {} failed (attempt {}/{}): {}",
                        what, target.sender_key, attempt, attempts, e
                    );
                    if attempt < attempts {
                        sleep(self.policy.backoff(attempt)).await;
                    }
                }
            }
        }
        false
    }

    async fn try_voice(&self, bot: &Bot, target: &Target, text: &str) -> bool {
        let language = speech_language_code(&bot.language);
        let audio = match timeout(self.speech_timeout, self.speech.synthesize(text, language)).await {
            Ok(Ok(audio)) if !audio.is_empty() => audio,
            Ok(Ok(_)) => {
                warn!("Speech synthesis returned no audio for {}", target.sender_key);
                return false;
            }
            Ok(Err(e)) => {
                warn!("Speech synthesis failed for {}: {}", target.sender_key, e);
                return false;
            }
            Err(_) => {
                warn!("Speech synthesis timed out for {}", target.sender_key);
                return false;
            }
        };

        match self.sender.send_voice(bot, target, audio).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Voice delivery to {} failed: {}", target.sender_key, e);
                false
            }
        }
    }

    /// Deliver `text`.
    ///
    /// Voice mode tries speech first and falls back to text. Text is retried
    /// per policy; if every attempt fails and the text is long, one last
    /// attempt sends the bot's short fallback message instead.
    pub async fn send(&self, bot: &Bot, target: &Target, text: &str, mode: DeliveryMode) -> DeliveryReport {
        if mode == DeliveryMode::Voice {
            if self.try_voice(bot, target, text).await {
                return DeliveryReport {
                    delivered: true,
                    mode: DeliveryMode::Voice,
                    sent_text: Some(text.to_string()),
                };
            }
            debug!("Falling back to text for {}", target.sender_key);
        }

        let sent = self
            .with_retry("Text", target, || self.sender.send_text(bot, target, text))
            .await;
        if sent {
            return DeliveryReport {
                delivered: true,
                mode: DeliveryMode::Text,
                sent_text: Some(text.to_string()),
            };
        }

        if text.chars().count() < self.policy.fallback_min_chars {
            return DeliveryReport::failed();
        }

        let fallback = bot.templates.delivery_fallback.as_str();
        match self.sender.send_text(bot, target, fallback).await {
            Ok(()) => {
                info!("Delivered short fallback to {}", target.sender_key);
                DeliveryReport {
                    delivered: true,
                    mode: DeliveryMode::Text,
                    sent_text: Some(fallback.to_string()),
                }
            }
            Err(e) => {
                warn!("Fallback to {} failed: {}", target.sender_key, e);
                DeliveryReport::failed()
            }
        }
    }

    /// Send media by URL with retry.
    pub async fn send_media(
        &self,
        bot: &Bot,
        target: &Target,
        kind: MediaKind,
        url: &str,
        caption: Option<&str>,
    ) -> bool {
        self.with_retry("Media", target, || {
            self.sender.send_media(bot, target, kind, url, caption)
        })
        .await
    }

    /// Send a message with reply buttons, with retry.
    pub async fn send_buttons(&self, bot: &Bot, target: &Target, text: &str, buttons: &[ReplyButton]) -> bool {
        self.with_retry("Buttons", target, || {
            self.sender.send_buttons(bot, target, text, buttons)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::{RecordingSender, Sent};
    use chrono::Utc;
    use database::{BotStatus, BotTemplates, DeliveryInterval, Platform};
    use mock_brain::ScriptedSpeech;

    fn bot() -> Bot {
        Bot {
            id: 1,
            name: "Bot".to_string(),
            status: BotStatus::Active,
            journey_length_days: 3,
            delivery_interval: DeliveryInterval::EveryMinutes { minutes: 10 },
            templates: BotTemplates::default(),
            persona: String::new(),
            language: "English".to_string(),
            credentials: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    fn adapter(sender: Arc<RecordingSender>, speech: ScriptedSpeech) -> DeliveryAdapter {
        DeliveryAdapter::new(sender, Arc::new(speech), RetryPolicy::default(), Duration::from_secs(5))
    }

    fn target() -> Target {
        Target::new(Platform::WhatsApp, "6281")
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success() {
        let sender = Arc::new(RecordingSender::new());
        sender.fail_next(2);

        let report = adapter(sender.clone(), ScriptedSpeech::broken())
            .send(&bot(), &target(), "hello", DeliveryMode::Text)
            .await;

        assert!(report.delivered);
        assert_eq!(report.sent_text.as_deref(), Some("hello"));
        assert_eq!(sender.texts(), vec!["hello".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_text_falls_back() {
        let sender = Arc::new(RecordingSender::new());
        sender.fail_next(3);
        let long = "a".repeat(1200);

        let report = adapter(sender.clone(), ScriptedSpeech::broken())
            .send(&bot(), &target(), &long, DeliveryMode::Text)
            .await;

        let fallback = BotTemplates::default().delivery_fallback;
        assert!(report.delivered);
        assert_eq!(report.sent_text.as_deref(), Some(fallback.as_str()));
        assert_eq!(sender.texts(), vec![fallback]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_text_gives_up() {
        let sender = Arc::new(RecordingSender::new());
        sender.fail_next(3);

        let report = adapter(sender.clone(), ScriptedSpeech::broken())
            .send(&bot(), &target(), "short", DeliveryMode::Text)
            .await;

        assert!(!report.delivered);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_voice_and_voice_fallback() {
        let sender = Arc::new(RecordingSender::new());
        let report = adapter(sender.clone(), ScriptedSpeech::new(None, Some(vec![7; 16])))
            .send(&bot(), &target(), "spoken", DeliveryMode::Voice)
            .await;
        assert_eq!(report.mode, DeliveryMode::Voice);
        assert_eq!(
            sender.sent(),
            vec![Sent::Voice {
                to: "6281".to_string(),
                bytes: 16
            }]
        );

        let sender = Arc::new(RecordingSender::new());
        sender.break_voice();
        let report = adapter(sender.clone(), ScriptedSpeech::new(None, Some(vec![7; 16])))
            .send(&bot(), &target(), "spoken", DeliveryMode::Voice)
            .await;
        assert!(report.delivered);
        assert_eq!(report.mode, DeliveryMode::Text);
        assert_eq!(sender.texts(), vec!["spoken".to_string()]);
    }
}
