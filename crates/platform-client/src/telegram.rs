//! Telegram Bot API client.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::credentials::TelegramCredentials;
use crate::error::PlatformError;
use crate::{DownloadedMedia, MediaKind, ReplyButton};

/// Default Bot API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Header carrying the webhook secret token.
pub const SECRET_TOKEN_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    file_path: Option<String>,
}

/// Client for the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: Client,
    api_base: String,
}

impl TelegramClient {
    /// Create a client against the public Bot API.
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

    /// Check the webhook secret header, if the bot configured one.
    pub fn verify_secret(
        credentials: &TelegramCredentials,
        header: Option<&str>,
    ) -> Result<(), PlatformError> {
        match credentials.secret_token.as_deref() {
            None => Ok(()),
            Some(expected) if header == Some(expected) => Ok(()),
            Some(_) => Err(PlatformError::VerificationFailed),
        }
    }

    fn method_url(&self, credentials: &TelegramCredentials, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, credentials.bot_token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        credentials: &TelegramCredentials,
        method: &str,
        body: Value,
    ) -> Result<Option<T>, PlatformError> {
        debug!("Telegram call: {}", method);

        let response = self
            .http
            .post(self.method_url(credentials, method))
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let parsed: ApiResponse<T> = response.json().await?;
        into_result(status, parsed)
    }

    /// Send a plain text message.
    pub async fn send_text(
        &self,
        credentials: &TelegramCredentials,
        chat_id: &str,
        text: &str,
    ) -> Result<(), PlatformError> {
        self.call::<Value>(credentials, "sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    /// Send image, video or audio by public link.
    pub async fn send_media(
        &self,
        credentials: &TelegramCredentials,
        chat_id: &str,
        kind: MediaKind,
        url: &str,
        caption: Option<&str>,
    ) -> Result<(), PlatformError> {
        let (method, field) = match kind {
            MediaKind::Image => ("sendPhoto", "photo"),
            MediaKind::Video => ("sendVideo", "video"),
            MediaKind::Audio => ("sendAudio", "audio"),
        };

        let mut body = json!({ "chat_id": chat_id });
        body[field] = Value::String(url.to_string());
        if let Some(caption) = caption {
            body["caption"] = Value::String(caption.to_string());
        }

        self.call::<Value>(credentials, method, body).await?;
        Ok(())
    }

    /// Send a text with an inline keyboard, one button per row.
    pub async fn send_buttons(
        &self,
        credentials: &TelegramCredentials,
        chat_id: &str,
        text: &str,
        buttons: &[ReplyButton],
    ) -> Result<(), PlatformError> {
        let keyboard: Vec<Vec<Value>> = buttons
            .iter()
            .map(|b| vec![json!({ "text": b.title, "callback_data": b.id })])
            .collect();

        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": { "inline_keyboard": keyboard }
        });
        self.call::<Value>(credentials, "sendMessage", body).await?;
        Ok(())
    }

    /// Upload an OGG/Opus voice note.
    pub async fn send_voice(
        &self,
        credentials: &TelegramCredentials,
        chat_id: &str,
        audio: Vec<u8>,
    ) -> Result<(), PlatformError> {
        let part = Part::bytes(audio)
            .file_name("reply.ogg")
            .mime_str("audio/ogg")
            .map_err(PlatformError::Http)?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("voice", part);

        let response = self
            .http
            .post(self.method_url(credentials, "sendVoice"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let parsed: ApiResponse<Value> = response.json().await?;
        into_result(status, parsed)?;
        Ok(())
    }

    /// Acknowledge an inline keyboard press so the client stops its spinner.
    pub async fn answer_callback(
        &self,
        credentials: &TelegramCredentials,
        callback_query_id: &str,
    ) -> Result<(), PlatformError> {
        self.call::<Value>(
            credentials,
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_query_id }),
        )
        .await?;
        Ok(())
    }

    /// Download a file by `file_id`.
    pub async fn download_file(
        &self,
        credentials: &TelegramCredentials,
        file_id: &str,
        mime_type: Option<&str>,
    ) -> Result<DownloadedMedia, PlatformError> {
        let info: Option<FileInfo> = self
            .call(credentials, "getFile", json!({ "file_id": file_id }))
            .await?;
        let file_path = info
            .and_then(|i| i.file_path)
            .ok_or_else(|| PlatformError::Api {
                status: 200,
                message: "file has no path".to_string(),
            })?;

        let url = format!("{}/file/bot{}/{}", self.api_base, credentials.bot_token, file_path);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Api {
                status: status.as_u16(),
                message: "file download failed".to_string(),
            });
        }

        Ok(DownloadedMedia {
            bytes: response.bytes().await?.to_vec(),
            mime_type: mime_type.unwrap_or("audio/ogg").to_string(),
        })
    }
}

fn into_result<T>(status: u16, response: ApiResponse<T>) -> Result<Option<T>, PlatformError> {
    if response.ok {
        Ok(response.result)
    } else {
        Err(PlatformError::Api {
            status,
            message: response
                .description
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}
