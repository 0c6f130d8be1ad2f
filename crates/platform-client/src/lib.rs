//! Rust clients for the WhatsApp Cloud API and the Telegram Bot API.
//!
//! This crate provides:
//! - Webhook payload types for both platforms ([`types`])
//! - [`WhatsAppClient`] and [`TelegramClient`] for outbound text, media,
//!   reply buttons, voice notes and inbound media download
//! - [`BotCredentials`], the per-bot credential document
//! - Canonical sender identities ([`identity`])
//!
//! Clients are stateless apart from their HTTP connection pool; credentials
//! are passed per call so one client serves every bot.
//!
//! # Example
//!
//! ```rust,no_run
//! use platform_client::{BotCredentials, WhatsAppClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = BotCredentials::from_value(&serde_json::json!({
//!         "whatsapp": {
//!             "phone_number_id": "1234567890",
//!             "access_token": "EAAG...",
//!             "verify_token": "my-verify-token"
//!         }
//!     }))?;
//!
//!     let client = WhatsAppClient::new()?;
//!     client
//!         .send_text(credentials.whatsapp()?, "6281234567890", "Hello!")
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod credentials;
pub mod error;
pub mod identity;
pub mod telegram;
pub mod types;
pub mod whatsapp;

pub use credentials::{BotCredentials, TelegramCredentials, WhatsAppCredentials};
pub use error::PlatformError;
pub use telegram::TelegramClient;
pub use whatsapp::WhatsAppClient;

/// A reply button offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyButton {
    /// Value returned when the button is pressed.
    pub id: String,
    /// Label shown to the user.
    pub title: String,
}

impl ReplyButton {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Kind of media being sent by link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

/// Media bytes fetched from a platform.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}
