//! WhatsApp Cloud API client.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::credentials::WhatsAppCredentials;
use crate::error::PlatformError;
use crate::{DownloadedMedia, MediaKind, ReplyButton};

/// Default Graph API base URL.
pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v18.0";

/// WhatsApp limits reply buttons to three, with short titles.
const MAX_BUTTONS: usize = 3;
const MAX_BUTTON_TITLE: usize = 20;

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct MediaUrl {
    url: String,
    #[serde(default)]
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadedMedia {
    id: String,
}

/// Client for the WhatsApp Cloud API.
#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    http: Client,
    api_base: String,
}

impl WhatsAppClient {
    /// Create a client against the public Graph API.
    pub fn new() -> Result<Self, PlatformError> {
        Self::with_base_url(DEFAULT_API_BASE)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(api_base: impl Into<String>) -> Result<Self, PlatformError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(PlatformError::Http)?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Check a webhook subscription handshake and return the challenge to echo.
    pub fn verify_webhook(
        credentials: &WhatsAppCredentials,
        mode: &str,
        token: &str,
        challenge: &str,
    ) -> Result<String, PlatformError> {
        match credentials.verify_token.as_deref() {
            Some(expected) if mode == "subscribe" && token == expected => Ok(challenge.to_string()),
            _ => Err(PlatformError::VerificationFailed),
        }
    }

    /// Send a plain text message.
    pub async fn send_text(
        &self,
        credentials: &WhatsAppCredentials,
        to: &str,
        text: &str,
    ) -> Result<(), PlatformError> {
        let body = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": { "body": text, "preview_url": true }
        });
        self.post_message(credentials, body).await
    }

    /// Send image, video or audio by public link.
    pub async fn send_media(
        &self,
        credentials: &WhatsAppCredentials,
        to: &str,
        kind: MediaKind,
        url: &str,
        caption: Option<&str>,
    ) -> Result<(), PlatformError> {
        let (type_name, mut media) = match kind {
            MediaKind::Image => ("image", json!({ "link": url })),
            MediaKind::Video => ("video", json!({ "link": url })),
            MediaKind::Audio => ("audio", json!({ "link": url })),
        };

        // Audio messages cannot carry a caption.
        if kind != MediaKind::Audio {
            if let Some(caption) = caption {
                media["caption"] = Value::String(caption.to_string());
            }
        }

        let mut body = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": type_name,
        });
        body[type_name] = media;

        self.post_message(credentials, body).await
    }

    /// Send a text with up to three reply buttons.
    pub async fn send_buttons(
        &self,
        credentials: &WhatsAppCredentials,
        to: &str,
        text: &str,
        buttons: &[ReplyButton],
    ) -> Result<(), PlatformError> {
        let buttons: Vec<Value> = buttons
            .iter()
            .take(MAX_BUTTONS)
            .map(|b| {
                json!({
                    "type": "reply",
                    "reply": {
                        "id": b.id,
                        "title": b.title.chars().take(MAX_BUTTON_TITLE).collect::<String>()
                    }
                })
            })
            .collect();

        let body = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": { "text": text },
                "action": { "buttons": buttons }
            }
        });
        self.post_message(credentials, body).await
    }

    /// Upload an OGG/Opus voice note and send it.
    pub async fn send_voice(
        &self,
        credentials: &WhatsAppCredentials,
        to: &str,
        audio: Vec<u8>,
    ) -> Result<(), PlatformError> {
        let part = Part::bytes(audio)
            .file_name("reply.ogg")
            .mime_str("audio/ogg")
            .map_err(PlatformError::Http)?;
        let form = Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", "audio/ogg")
            .part("file", part);

        let url = format!("{}/{}/media", self.api_base, credentials.phone_number_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&credentials.access_token)
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadedMedia = check(response).await?.json().await?;

        let body = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "audio",
            "audio": { "id": uploaded.id }
        });
        self.post_message(credentials, body).await
    }

    /// Download inbound media by its media ID.
    pub async fn download_media(
        &self,
        credentials: &WhatsAppCredentials,
        media_id: &str,
    ) -> Result<DownloadedMedia, PlatformError> {
        let url = format!("{}/{}", self.api_base, media_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&credentials.access_token)
            .send()
            .await?;
        let located: MediaUrl = check(response).await?.json().await?;

        let response = self
            .http
            .get(&located.url)
            .bearer_auth(&credentials.access_token)
            .send()
            .await?;
        let bytes = check(response).await?.bytes().await?;

        Ok(DownloadedMedia {
            bytes: bytes.to_vec(),
            mime_type: located.mime_type.unwrap_or_else(|| "audio/ogg".to_string()),
        })
    }

    async fn post_message(
        &self,
        credentials: &WhatsAppCredentials,
        body: Value,
    ) -> Result<(), PlatformError> {
        let url = format!("{}/{}/messages", self.api_base, credentials.phone_number_id);
        debug!("WhatsApp send: {}", body["type"]);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&credentials.access_token)
            .json(&body)
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }
}

/// Map a non-success Graph API response to [`PlatformError::Api`].
async fn check(response: Response) -> Result<Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GraphErrorBody>(&text)
        .map(|b| b.error.message)
        .unwrap_or(text);

    Err(PlatformError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(verify_token: Option<&str>) -> WhatsAppCredentials {
        WhatsAppCredentials {
            phone_number_id: "123".to_string(),
            access_token: "token".to_string(),
            verify_token: verify_token.map(str::to_string),
        }
    }

    #[test]
    fn test_verify_ok() {
        let challenge =
            WhatsAppClient::verify_webhook(&creds(Some("secret")), "subscribe", "secret", "42").unwrap();
        assert_eq!(challenge, "42");
    }

    #[test]
    fn test_verify_bad() {
        assert!(WhatsAppClient::verify_webhook(&creds(Some("secret")), "subscribe", "wrong", "42").is_err());
        assert!(WhatsAppClient::verify_webhook(&creds(Some("secret")), "unsubscribe", "secret", "42").is_err());
        assert!(WhatsAppClient::verify_webhook(&creds(None), "subscribe", "", "42").is_err());
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = WhatsAppClient::with_base_url("http://localhost:9000/").unwrap();
        assert_eq!(client.api_base, "http://localhost:9000");
    }
}
