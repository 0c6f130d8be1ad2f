//! Telegram Bot API update payload.

use serde::Deserialize;

/// One webhook update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub edited_message: Option<TelegramMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub voice: Option<TelegramFile>,
    #[serde(default)]
    pub audio: Option<TelegramFile>,
    #[serde(default)]
    pub video: Option<TelegramFile>,
    #[serde(default)]
    pub document: Option<TelegramFile>,
    #[serde(default)]
    pub sticker: Option<TelegramFile>,
    #[serde(default)]
    pub photo: Vec<TelegramFile>,
}

impl TelegramMessage {
    /// Whether the message carries any non-text attachment.
    pub fn has_attachment(&self) -> bool {
        self.audio.is_some()
            || self.video.is_some()
            || self.document.is_some()
            || self.sticker.is_some()
            || !self.photo.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

impl TelegramUser {
    /// "First Last", falling back to the username.
    pub fn display_name(&self) -> Option<String> {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        if full.trim().is_empty() {
            self.username.clone()
        } else {
            Some(full)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

/// Any downloadable file (voice, audio, photo size, ...).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramFile {
    pub file_id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Inline keyboard button press.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_update() {
        let json = r#"{
            "update_id": 10,
            "message": {
                "message_id": 5,
                "from": {"id": 42, "first_name": "Budi", "language_code": "id"},
                "chat": {"id": 42, "type": "private"},
                "date": 1700000000,
                "text": "halo"
            }
        }"#;

        let update: Update = serde_json::from_str(json).unwrap();
        let message = update.message.unwrap();
        assert_eq!(message.text.as_deref(), Some("halo"));
        assert_eq!(message.from.as_ref().unwrap().display_name().as_deref(), Some("Budi"));
        assert!(!message.has_attachment());
    }

    #[test]
    fn test_parse_callback() {
        let json = r#"{
            "update_id": 11,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 42, "username": "budi"},
                "message": {"message_id": 6, "chat": {"id": 42}},
                "data": "handoff_accept"
            }
        }"#;

        let update: Update = serde_json::from_str(json).unwrap();
        let callback = update.callback_query.unwrap();
        assert_eq!(callback.data.as_deref(), Some("handoff_accept"));
        assert_eq!(callback.from.display_name().as_deref(), Some("budi"));
    }
}
