//! WhatsApp Cloud API webhook payload.
//!
//! Only the fields the engine reads are modeled; everything else is ignored.

use serde::Deserialize;

/// Top-level webhook body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

impl WebhookPayload {
    /// Every change value in the payload, in order.
    pub fn values(&self) -> impl Iterator<Item = &WhatsAppValue> {
        self.entry
            .iter()
            .flat_map(|e| e.changes.iter())
            .map(|c| &c.value)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: WhatsAppValue,
}

/// The `value` of one change: messages, delivery statuses and contacts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppValue {
    #[serde(default)]
    pub contacts: Vec<WhatsAppContact>,
    #[serde(default)]
    pub messages: Vec<WhatsAppMessage>,
    #[serde(default)]
    pub statuses: Vec<WhatsAppStatus>,
}

impl WhatsAppValue {
    /// Profile name of the contact with this WhatsApp ID.
    pub fn profile_name(&self, wa_id: &str) -> Option<&str> {
        self.contacts
            .iter()
            .find(|c| c.wa_id.as_deref() == Some(wa_id))
            .or_else(|| self.contacts.first())
            .and_then(|c| c.profile.as_ref())
            .and_then(|p| p.name.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppContact {
    #[serde(default)]
    pub wa_id: Option<String>,
    #[serde(default)]
    pub profile: Option<WhatsAppProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppProfile {
    #[serde(default)]
    pub name: Option<String>,
}

/// A delivery/read receipt.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppStatus {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
}

/// An inbound user message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppMessage {
    pub id: String,
    pub from: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type", default)]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<WhatsAppText>,
    #[serde(default)]
    pub audio: Option<WhatsAppMedia>,
    #[serde(default)]
    pub image: Option<WhatsAppMedia>,
    #[serde(default)]
    pub video: Option<WhatsAppMedia>,
    #[serde(default)]
    pub document: Option<WhatsAppMedia>,
    #[serde(default)]
    pub sticker: Option<WhatsAppMedia>,
    #[serde(default)]
    pub interactive: Option<WhatsAppInteractive>,
    #[serde(default)]
    pub button: Option<WhatsAppButton>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppText {
    pub body: String,
}

/// A media attachment; `id` is resolved through the media endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppMedia {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Set for push-to-talk voice notes.
    #[serde(default)]
    pub voice: Option<bool>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Interactive reply (button or list selection).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppInteractive {
    #[serde(default)]
    pub button_reply: Option<WhatsAppReply>,
    #[serde(default)]
    pub list_reply: Option<WhatsAppReply>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppReply {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Quick-reply button on a template message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppButton {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub payload: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_message() {
        let json = r#"{
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"display_phone_number": "15550001111", "phone_number_id": "123"},
                        "contacts": [{"profile": {"name": "Rina"}, "wa_id": "6281234567890"}],
                        "messages": [{
                            "from": "6281234567890",
                            "id": "wamid.ABC",
                            "timestamp": "1700000000",
                            "type": "text",
                            "text": {"body": "Hello"}
                        }]
                    }
                }]
            }]
        }"#;

        let payload: WebhookPayload = serde_json::from_str(json).unwrap();
        let value = payload.values().next().unwrap();
        assert_eq!(value.messages[0].id, "wamid.ABC");
        assert_eq!(value.messages[0].text.as_ref().unwrap().body, "Hello");
        assert_eq!(value.profile_name("6281234567890"), Some("Rina"));
    }

    #[test]
    fn test_parse_status_only() {
        let json = r#"{"entry":[{"changes":[{"value":{"statuses":[{"id":"wamid.X","status":"delivered","recipient_id":"1555"}]}}]}]}"#;
        let payload: WebhookPayload = serde_json::from_str(json).unwrap();
        let value = payload.values().next().unwrap();
        assert!(value.messages.is_empty());
        assert_eq!(value.statuses[0].status, "delivered");
    }
}
