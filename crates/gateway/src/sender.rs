//! [`PlatformSender`] over the real WhatsApp and Telegram clients.

use async_trait::async_trait;
use database::{Bot, Platform};
use journey_engine::{EngineError, PlatformSender, Target};
use platform_client::identity::telegram_chat_id;
use platform_client::{
    BotCredentials, DownloadedMedia, MediaKind, PlatformError, ReplyButton, TelegramClient, WhatsAppClient,
};

type EngineResult<T> = journey_engine::Result<T>;

fn send_failed(e: PlatformError) -> EngineError {
    EngineError::SendFailed(e.to_string())
}

fn credentials(bot: &Bot) -> std::result::Result<BotCredentials, PlatformError> {
    BotCredentials::from_value(&bot.credentials)
}

/// Telegram chat ID for a target's sender key.
fn chat_id(target: &Target) -> std::result::Result<&str, PlatformError> {
    telegram_chat_id(&target.sender_key)
        .ok_or_else(|| PlatformError::Config(format!("not a Telegram sender: {}", target.sender_key)))
}

/// Both platform clients, picked per target.
pub struct PlatformClients {
    whatsapp: WhatsAppClient,
    telegram: TelegramClient,
}

impl PlatformClients {
    pub fn new() -> std::result::Result<Self, PlatformError> {
        Ok(Self {
            whatsapp: WhatsAppClient::new()?,
            telegram: TelegramClient::new()?,
        })
    }

    pub fn telegram(&self) -> &TelegramClient {
        &self.telegram
    }

    async fn text(&self, bot: &Bot, target: &Target, text: &str) -> std::result::Result<(), PlatformError> {
        let creds = credentials(bot)?;
        match target.platform {
            Platform::WhatsApp => self.whatsapp.send_text(creds.whatsapp()?, &target.sender_key, text).await,
            Platform::Telegram => self.telegram.send_text(creds.telegram()?, chat_id(target)?, text).await,
        }
    }

    async fn media(
        &self,
        bot: &Bot,
        target: &Target,
        kind: MediaKind,
        url: &str,
        caption: Option<&str>,
    ) -> std::result::Result<(), PlatformError> {
        let creds = credentials(bot)?;
        match target.platform {
            Platform::WhatsApp => {
                self.whatsapp
                    .send_media(creds.whatsapp()?, &target.sender_key, kind, url, caption)
                    .await
            }
            Platform::Telegram => {
                self.telegram
                    .send_media(creds.telegram()?, chat_id(target)?, kind, url, caption)
                    .await
            }
        }
    }

    async fn buttons(
        &self,
        bot: &Bot,
        target: &Target,
        text: &str,
        buttons: &[ReplyButton],
    ) -> std::result::Result<(), PlatformError> {
        let creds = credentials(bot)?;
        match target.platform {
            Platform::WhatsApp => {
                self.whatsapp
                    .send_buttons(creds.whatsapp()?, &target.sender_key, text, buttons)
                    .await
            }
            Platform::Telegram => {
                self.telegram
                    .send_buttons(creds.telegram()?, chat_id(target)?, text, buttons)
                    .await
            }
        }
    }

    async fn voice(&self, bot: &Bot, target: &Target, audio: Vec<u8>) -> std::result::Result<(), PlatformError> {
        let creds = credentials(bot)?;
        match target.platform {
            Platform::WhatsApp => self.whatsapp.send_voice(creds.whatsapp()?, &target.sender_key, audio).await,
            Platform::Telegram => self.telegram.send_voice(creds.telegram()?, chat_id(target)?, audio).await,
        }
    }

    async fn download(
        &self,
        bot: &Bot,
        platform: Platform,
        media_id: &str,
    ) -> std::result::Result<DownloadedMedia, PlatformError> {
        let creds = credentials(bot)?;
        match platform {
            Platform::WhatsApp => self.whatsapp.download_media(creds.whatsapp()?, media_id).await,
            Platform::Telegram => self.telegram.download_file(creds.telegram()?, media_id, None).await,
        }
    }
}

#[async_trait]
impl PlatformSender for PlatformClients {
    async fn send_text(&self, bot: &Bot, target: &Target, text: &str) -> EngineResult<()> {
        self.text(bot, target, text).await.map_err(send_failed)
    }

    async fn send_media(
        &self,
        bot: &Bot,
        target: &Target,
        kind: MediaKind,
        url: &str,
        caption: Option<&str>,
    ) -> EngineResult<()> {
        self.media(bot, target, kind, url, caption)
            .await
            .map_err(send_failed)
    }

    async fn send_buttons(&self, bot: &Bot, target: &Target, text: &str, buttons: &[ReplyButton]) -> EngineResult<()> {
        self.buttons(bot, target, text, buttons)
            .await
            .map_err(send_failed)
    }

    async fn send_voice(&self, bot: &Bot, target: &Target, audio: Vec<u8>) -> EngineResult<()> {
        self.voice(bot, target, audio).await.map_err(send_failed)
    }

    async fn fetch_media(&self, bot: &Bot, platform: Platform, media_id: &str) -> EngineResult<DownloadedMedia> {
        self.download(bot, platform, media_id)
            .await
            .map_err(|e| EngineError::MediaFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_id() {
        let target = Target::new(Platform::Telegram, "tg_-100123");
        assert_eq!(chat_id(&target).unwrap(), "-100123");

        let phone = Target::new(Platform::Telegram, "6281234");
        assert!(chat_id(&phone).is_err());
    }
}
