//! Inbound normalization.
//!
//! Converts platform webhook payloads into [`InboundMessage`]s keyed by a
//! canonical sender. Button presses become text (the button ID) so the
//! rest of the engine only ever sees text or a voice note.

use chrono::{DateTime, TimeZone, Utc};
use database::Platform;
use platform_client::identity::{telegram_sender_key, whatsapp_sender_key};
use platform_client::types::{TelegramMessage, Update, WebhookPayload, WhatsAppMessage};
use tracing::debug;

/// A voice note waiting for transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceNote {
    pub media_id: String,
    pub mime_type: String,
}

/// Profile metadata used when creating a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub display_name: Option<String>,
    pub locale: Option<String>,
}

/// A user message in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub bot_id: i64,
    pub platform: Platform,
    /// Platform message ID, when the platform supplies one.
    pub external_id: Option<String>,
    pub sender_key: String,
    /// Message text; empty for a voice note until transcribed.
    pub text: String,
    pub voice: Option<VoiceNote>,
    pub profile: Profile,
    pub source_ip: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// A text message with no metadata.
    pub fn text(bot_id: i64, platform: Platform, sender_key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            bot_id,
            platform,
            external_id: None,
            sender_key: sender_key.into(),
            text: text.into().trim().to_string(),
            voice: None,
            profile: Profile::default(),
            source_ip: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }
}

/// Outcome of normalizing one platform event.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// A message to process.
    Message(InboundMessage),
    /// Media the engine cannot read; the user gets a "please send text" notice.
    Unsupported {
        bot_id: i64,
        platform: Platform,
        sender_key: String,
        external_id: Option<String>,
    },
    /// Nothing for the engine (receipts, edits, empty events).
    Ignored,
}

fn whatsapp_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|t| t.parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now)
}

fn whatsapp_text(message: &WhatsAppMessage) -> Option<String> {
    if let Some(text) = &message.text {
        return Some(text.body.clone());
    }
    if let Some(interactive) = &message.interactive {
        return interactive
            .button_reply
            .as_ref()
            .or(interactive.list_reply.as_ref())
            .map(|reply| reply.id.clone());
    }
    message
        .button
        .as_ref()
        .and_then(|b| b.payload.clone().or_else(|| b.text.clone()))
}

/// Normalize every message in a WhatsApp webhook.
///
/// Status receipts produce nothing.
pub fn normalize_whatsapp(
    bot_id: i64,
    payload: &WebhookPayload,
    source_ip: Option<&str>,
    default_country_code: Option<&str>,
) -> Vec<Normalized> {
    let mut out = Vec::new();

    for value in payload.values() {
        for message in &value.messages {
            let Some(sender_key) = whatsapp_sender_key(&message.from, default_country_code) else {
                debug!("Ignoring WhatsApp message with unusable sender {:?}", message.from);
                out.push(Normalized::Ignored);
                continue;
            };

            let external_id = Some(message.id.clone());

            if let Some(audio) = &message.audio {
                out.push(Normalized::Message(InboundMessage {
                    bot_id,
                    platform: Platform::WhatsApp,
                    external_id,
                    sender_key,
                    text: String::new(),
                    voice: Some(VoiceNote {
                        media_id: audio.id.clone(),
                        mime_type: audio
                            .mime_type
                            .clone()
                            .unwrap_or_else(|| "audio/ogg".to_string()),
                    }),
                    profile: Profile {
                        display_name: value.profile_name(&message.from).map(str::to_string),
                        locale: None,
                    },
                    source_ip: source_ip.map(str::to_string),
                    received_at: whatsapp_timestamp(message.timestamp.as_deref()),
                }));
                continue;
            }

            match whatsapp_text(message) {
                Some(text) if !text.trim().is_empty() => {
                    out.push(Normalized::Message(InboundMessage {
                        bot_id,
                        platform: Platform::WhatsApp,
                        external_id,
                        sender_key,
                        text: text.trim().to_string(),
                        voice: None,
                        profile: Profile {
                            display_name: value.profile_name(&message.from).map(str::to_string),
                            locale: None,
                        },
                        source_ip: source_ip.map(str::to_string),
                        received_at: whatsapp_timestamp(message.timestamp.as_deref()),
                    }));
                }
                Some(_) => out.push(Normalized::Ignored),
                None => out.push(Normalized::Unsupported {
                    bot_id,
                    platform: Platform::WhatsApp,
                    sender_key,
                    external_id,
                }),
            }
        }
    }

    out
}

fn telegram_received_at(message: &TelegramMessage) -> DateTime<Utc> {
    Utc.timestamp_opt(message.date, 0)
        .single()
        .filter(|_| message.date > 0)
        .unwrap_or_else(Utc::now)
}

/// Normalize a Telegram update.
///
/// The update ID is the external message ID. Edited messages are ignored.
pub fn normalize_telegram(bot_id: i64, update: &Update, source_ip: Option<&str>) -> Normalized {
    let external_id = Some(update.update_id.to_string());

    if let Some(callback) = &update.callback_query {
        let Some(data) = callback.data.as_deref().filter(|d| !d.trim().is_empty()) else {
            return Normalized::Ignored;
        };
        let chat_id = callback
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(callback.from.id);

        return Normalized::Message(InboundMessage {
            bot_id,
            platform: Platform::Telegram,
            external_id,
            sender_key: telegram_sender_key(chat_id),
            text: data.trim().to_string(),
            voice: None,
            profile: Profile {
                display_name: callback.from.display_name(),
                locale: callback.from.language_code.clone(),
            },
            source_ip: source_ip.map(str::to_string),
            received_at: Utc::now(),
        });
    }

    let Some(message) = &update.message else {
        return Normalized::Ignored;
    };

    let sender_key = telegram_sender_key(message.chat.id);
    let profile = Profile {
        display_name: message.from.as_ref().and_then(|u| u.display_name()),
        locale: message.from.as_ref().and_then(|u| u.language_code.clone()),
    };

    let (text, voice) = if let Some(voice) = &message.voice {
        (
            String::new(),
            Some(VoiceNote {
                media_id: voice.file_id.clone(),
                mime_type: voice
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "audio/ogg".to_string()),
            }),
        )
    } else if let Some(text) = message.text.as_deref().filter(|t| !t.trim().is_empty()) {
        (text.trim().to_string(), None)
    } else if message.has_attachment() {
        return Normalized::Unsupported {
            bot_id,
            platform: Platform::Telegram,
            sender_key,
            external_id,
        };
    } else {
        return Normalized::Ignored;
    };

    Normalized::Message(InboundMessage {
        bot_id,
        platform: Platform::Telegram,
        external_id,
        sender_key,
        text,
        voice,
        profile,
        source_ip: source_ip.map(str::to_string),
        received_at: telegram_received_at(message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whatsapp(messages: &str) -> WebhookPayload {
        let json = format!(
            r#"{{"entry":[{{"changes":[{{"value":{{
                "contacts":[{{"profile":{{"name":"Rina"}},"wa_id":"6281234567890"}}],
                "messages":[{}]
            }}}}]}}]}}"#,
            messages
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_whatsapp_text() {
        let payload = whatsapp(
            r#"{"from":"+62 812-3456-7890","id":"wamid.A","timestamp":"1700000000","type":"text","text":{"body":"  Hello  "}}"#,
        );
        let out = normalize_whatsapp(7, &payload, Some("10.0.0.1"), None);

        let Normalized::Message(msg) = &out[0] else {
            panic!("expected message, got {:?}", out);
        };
        assert_eq!(msg.bot_id, 7);
        assert_eq!(msg.sender_key, "6281234567890");
        assert_eq!(msg.text, "Hello");
        assert_eq!(msg.external_id.as_deref(), Some("wamid.A"));
        assert_eq!(msg.profile.display_name.as_deref(), Some("Rina"));
        assert_eq!(msg.source_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(msg.received_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_whatsapp_button_and_voice() {
        let payload = whatsapp(
            r#"{"from":"6281234567890","id":"wamid.B","type":"interactive","interactive":{"type":"button_reply","button_reply":{"id":"handoff_accept","title":"Yes"}}},
               {"from":"6281234567890","id":"wamid.C","type":"audio","audio":{"id":"media-1","mime_type":"audio/ogg; codecs=opus","voice":true}}"#,
        );
        let out = normalize_whatsapp(1, &payload, None, None);
        assert_eq!(out.len(), 2);

        let Normalized::Message(button) = &out[0] else {
            panic!("expected button message");
        };
        assert_eq!(button.text, "handoff_accept");

        let Normalized::Message(voice) = &out[1] else {
            panic!("expected voice message");
        };
        assert!(voice.text.is_empty());
        assert_eq!(voice.voice.as_ref().unwrap().media_id, "media-1");
    }

    #[test]
    fn test_whatsapp_unsupported_and_receipts() {
        let payload = whatsapp(
            r#"{"from":"6281234567890","id":"wamid.D","type":"image","image":{"id":"img-1"}}"#,
        );
        let out = normalize_whatsapp(1, &payload, None, None);
        assert!(matches!(&out[0], Normalized::Unsupported { sender_key, .. } if sender_key == "6281234567890"));

        let receipts: WebhookPayload = serde_json::from_str(
            r#"{"entry":[{"changes":[{"value":{"statuses":[{"id":"wamid.X","status":"read"}]}}]}]}"#,
        )
        .unwrap();
        assert!(normalize_whatsapp(1, &receipts, None, None).is_empty());
    }

    #[test]
    fn test_telegram_text_and_callback() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":99,"message":{"message_id":1,"from":{"id":42,"first_name":"Budi","language_code":"id"},"chat":{"id":42},"date":1700000000,"text":"/start"}}"#,
        )
        .unwrap();
        let Normalized::Message(msg) = normalize_telegram(3, &update, None) else {
            panic!("expected message");
        };
        assert_eq!(msg.sender_key, "tg_42");
        assert_eq!(msg.text, "/start");
        assert_eq!(msg.external_id.as_deref(), Some("99"));
        assert_eq!(msg.profile.locale.as_deref(), Some("id"));

        let callback: Update = serde_json::from_str(
            r#"{"update_id":100,"callback_query":{"id":"cb","from":{"id":42},"message":{"message_id":2,"chat":{"id":42}},"data":"handoff_decline"}}"#,
        )
        .unwrap();
        let Normalized::Message(msg) = normalize_telegram(3, &callback, None) else {
            panic!("expected callback message");
        };
        assert_eq!(msg.text, "handoff_decline");
        assert_eq!(msg.sender_key, "tg_42");
    }

    #[test]
    fn test_telegram_ignored_and_unsupported() {
        let edited: Update = serde_json::from_str(
            r#"{"update_id":5,"edited_message":{"message_id":1,"chat":{"id":42},"text":"fixed"}}"#,
        )
        .unwrap();
        assert_eq!(normalize_telegram(1, &edited, None), Normalized::Ignored);

        let photo: Update = serde_json::from_str(
            r#"{"update_id":6,"message":{"message_id":1,"chat":{"id":42},"photo":[{"file_id":"p1"}]}}"#,
        )
        .unwrap();
        assert!(matches!(normalize_telegram(1, &photo, None), Normalized::Unsupported { .. }));
    }
}
