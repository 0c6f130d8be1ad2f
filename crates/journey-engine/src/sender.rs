//! Platform sender trait and implementations.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use database::{Bot, Platform};
use platform_client::{DownloadedMedia, MediaKind, ReplyButton};

use crate::error::{EngineError, Result};

/// Who a message goes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub platform: Platform,
    /// Canonical sender key of the user.
    pub sender_key: String,
}

impl Target {
    pub fn new(platform: Platform, sender_key: impl Into<String>) -> Self {
        Self {
            platform,
            sender_key: sender_key.into(),
        }
    }
}

/// Outbound capability of the chat platforms.
///
/// Abstracted so the engine can run against real platform clients,
/// a logger, or a recorder in tests. Every call is a fallible remote call;
/// retries are the caller's concern.
#[async_trait]
pub trait PlatformSender: Send + Sync {
    /// Send a text message.
    async fn send_text(&self, bot: &Bot, target: &Target, text: &str) -> Result<()>;

    /// Send media by URL with an optional caption.
    async fn send_media(
        &self,
        bot: &Bot,
        target: &Target,
        kind: MediaKind,
        url: &str,
        caption: Option<&str>,
    ) -> Result<()>;

    /// Send a message with reply buttons.
    ///
    /// Default implementation lists the options as plain text.
    async fn send_buttons(
        &self,
        bot: &Bot,
        target: &Target,
        text: &str,
        buttons: &[ReplyButton],
    ) -> Result<()> {
        let options = buttons
            .iter()
            .map(|b| b.title.as_str())
            .collect::<Vec<_>>()
            .join(" / ");
        self.send_text(bot, target, &format!("{}\n\n{}", text, options))
            .await
    }

    /// Send synthesized speech as a voice note.
    async fn send_voice(&self, _bot: &Bot, _target: &Target, _audio: Vec<u8>) -> Result<()> {
        Err(EngineError::SendFailed("voice notes not supported".to_string()))
    }

    /// Download inbound media (voice notes) by platform media ID.
    async fn fetch_media(
        &self,
        _bot: &Bot,
        _platform: Platform,
        media_id: &str,
    ) -> Result<DownloadedMedia> {
        Err(EngineError::MediaFailed(format!(
            "cannot download media {}",
            media_id
        )))
    }
}

/// A sender that only logs what it would send.
#[derive(Debug, Clone, Default)]
pub struct LoggingSender;

#[async_trait]
impl PlatformSender for LoggingSender {
    async fn send_text(&self, bot: &Bot, target: &Target, text: &str) -> Result<()> {
        tracing::info!(
            "[bot {}] [{}] Sending text to {}: {}",
            bot.id,
            target.platform,
            target.sender_key,
            text
        );
        Ok(())
    }

    async fn send_media(
        &self,
        bot: &Bot,
        target: &Target,
        kind: MediaKind,
        url: &str,
        _caption: Option<&str>,
    ) -> Result<()> {
        tracing::info!(
            "[bot {}] [{}] Sending {:?} to {}: {}",
            bot.id,
            target.platform,
            kind,
            target.sender_key,
            url
        );
        Ok(())
    }
}

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        to: String,
        text: String,
    },
    Media {
        to: String,
        kind: MediaKind,
        url: String,
        caption: Option<String>,
    },
    Buttons {
        to: String,
        text: String,
        ids: Vec<String>,
    },
    Voice {
        to: String,
        bytes: usize,
    },
}

/// A sender that records every successful call, for tests.
///
/// Failures can be injected with [`RecordingSender::fail_next`]; a failed
/// call is not recorded.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Sent>>,
    failures: AtomicUsize,
    voice_broken: AtomicBool,
    media: Mutex<Option<DownloadedMedia>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for every media download.
    pub fn with_media(bytes: Vec<u8>, mime_type: &str) -> Self {
        let sender = Self::default();
        if let Ok(mut media) = sender.media.lock() {
            *media = Some(DownloadedMedia {
                bytes,
                mime_type: mime_type.to_string(),
            });
        }
        sender
    }

    /// Make the next `count` sends fail.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Make every voice note fail.
    pub fn break_voice(&self) {
        self.voice_broken.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Text of every text and button message, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } | Sent::Buttons { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) -> Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::SendFailed("injected failure".to_string()));
        }
        if let Ok(mut sent_list) = self.sent.lock() {
            sent_list.push(sent);
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformSender for RecordingSender {
    async fn send_text(&self, _bot: &Bot, target: &Target, text: &str) -> Result<()> {
        self.record(Sent::Text {
            to: target.sender_key.clone(),
            text: text.to_string(),
        })
    }

    async fn send_media(
        &self,
        _bot: &Bot,
        target: &Target,
        kind: MediaKind,
        url: &str,
        caption: Option<&str>,
    ) -> Result<()> {
        self.record(Sent::Media {
            to: target.sender_key.clone(),
            kind,
            url: url.to_string(),
            caption: caption.map(str::to_string),
        })
    }

    async fn send_buttons(
        &self,
        _bot: &Bot,
        target: &Target,
        text: &str,
        buttons: &[ReplyButton],
    ) -> Result<()> {
        self.record(Sent::Buttons {
            to: target.sender_key.clone(),
            text: text.to_string(),
            ids: buttons.iter().map(|b| b.id.clone()).collect(),
        })
    }

    async fn send_voice(&self, _bot: &Bot, target: &Target, audio: Vec<u8>) -> Result<()> {
        if self.voice_broken.load(Ordering::SeqCst) {
            return Err(EngineError::SendFailed("voice upload rejected".to_string()));
        }
        self.record(Sent::Voice {
            to: target.sender_key.clone(),
            bytes: audio.len(),
        })
    }

    async fn fetch_media(
        &self,
        _bot: &Bot,
        _platform: Platform,
        media_id: &str,
    ) -> Result<DownloadedMedia> {
        self.media
            .lock()
            .ok()
            .and_then(|m| m.clone())
            .ok_or_else(|| EngineError::MediaFailed(format!("no media {}", media_id)))
    }
}
