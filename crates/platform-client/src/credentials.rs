//! Per-bot platform credentials.
//!
//! Stored on the bot as an opaque JSON document:
//!
//! ```json
//! {
//!   "whatsapp": { "phone_number_id": "...", "access_token": "...", "verify_token": "..." },
//!   "telegram": { "bot_token": "...", "secret_token": "..." }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// WhatsApp Cloud API credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatsAppCredentials {
    pub phone_number_id: String,
    pub access_token: String,
    /// Token expected in the webhook subscription handshake.
    #[serde(default)]
    pub verify_token: Option<String>,
}

/// Telegram Bot API credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramCredentials {
    pub bot_token: String,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` header value.
    #[serde(default)]
    pub secret_token: Option<String>,
}

/// Credentials for every platform a bot is connected to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotCredentials {
    #[serde(default)]
    pub whatsapp: Option<WhatsAppCredentials>,
    #[serde(default)]
    pub telegram: Option<TelegramCredentials>,
}

impl BotCredentials {
    /// Parse from the bot's stored JSON document.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, PlatformError> {
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn whatsapp(&self) -> Result<&WhatsAppCredentials, PlatformError> {
        self.whatsapp
            .as_ref()
            .ok_or(PlatformError::MissingCredentials("whatsapp"))
    }

    pub fn telegram(&self) -> Result<&TelegramCredentials, PlatformError> {
        self.telegram
            .as_ref()
            .ok_or(PlatformError::MissingCredentials("telegram"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial() {
        let creds = BotCredentials::from_value(&serde_json::json!({
            "telegram": { "bot_token": "123:abc" }
        }))
        .unwrap();

        assert_eq!(creds.telegram().unwrap().bot_token, "123:abc");
        assert!(creds.telegram().unwrap().secret_token.is_none());
        assert!(matches!(
            creds.whatsapp(),
            Err(PlatformError::MissingCredentials("whatsapp"))
        ));
    }

    #[test]
    fn test_parse_empty() {
        let creds = BotCredentials::from_value(&serde_json::json!({})).unwrap();
        assert_eq!(creds, BotCredentials::default());
    }
}
