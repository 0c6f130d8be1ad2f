//! LlmBrain implementation using an OpenAI-compatible API.

use async_trait::async_trait;
use brain_core::{Analysis, BrainError, Classifier, ReplyRequest, Responder, Speech};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use tracing::{debug, info, warn};

use crate::api_types::{
    ApiError, ChatCompletionRequest, ChatCompletionResponse, ResponseFormat,
    SpeechRequest, TranscriptionResponse,
};
use crate::config::LlmConfig;
use crate::prompt::{classification_messages, parse_analysis, reply_messages};

/// Reply, classification and speech collaborator backed by one
/// OpenAI-compatible endpoint.
pub struct LlmBrain {
    client: Client,
    config: LlmConfig,
}

impl LlmBrain {
    /// Create a new LlmBrain with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self, BrainError> {
        let client = Client::builder()
            .build()
            .map_err(|e| BrainError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "LlmBrain initialized with model: {}, classifier: {}",
            config.model, config.classifier_model
        );

        Ok(Self { client, config })
    }

    /// Create an LlmBrain from environment variables.
    ///
    /// See [`LlmConfig::from_env`] for required environment variables.
    pub fn from_env() -> Result<Self, BrainError> {
        Self::new(LlmConfig::from_env()?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    /// Make a chat completion request and return the first choice's text.
    async fn chat_completion(&self, request: ChatCompletionRequest) -> Result<String, BrainError> {
        debug!("Sending chat completion with model {}", request.model);

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| BrainError::Network(format!("Failed to send request: {}", e)))?;

        let response = check_status(response).await?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| BrainError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        if let Some(usage) = completion.usage {
            debug!(
                "Token usage - prompt: {}, completion: {}, total: {}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BrainError::InvalidResponse("No content in response".to_string()))
    }
}

/// Turn a non-success response into a `ProcessingFailed` error.
async fn check_status(response: Response) -> Result<Response, BrainError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();

    // Try to parse as API error
    if let Ok(api_error) = serde_json::from_str::<ApiError>(&error_text) {
        return Err(BrainError::ProcessingFailed(format!(
            "API error ({}): {}",
            status.as_u16(),
            api_error.error.message
        )));
    }

    Err(BrainError::ProcessingFailed(format!(
        "API error ({}): {}",
        status.as_u16(),
        error_text
    )))
}

#[async_trait]
impl Responder for LlmBrain {
    async fn reply(&self, request: ReplyRequest) -> Result<String, BrainError> {
        debug!("Generating reply for {}", request.sender);

        self.chat_completion(ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: reply_messages(&request),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format: None,
        })
        .await
    }

    fn name(&self) -> &str {
        "LlmBrain"
    }
}

#[async_trait]
impl Classifier for LlmBrain {
    async fn analyze(&self, text: &str) -> Result<Analysis, BrainError> {
        let raw = self
            .chat_completion(ChatCompletionRequest {
                model: self.config.classifier_model.clone(),
                messages: classification_messages(text, &self.config.tag_vocabulary),
                max_tokens: Some(200),
                temperature: Some(0.0),
                response_format: Some(ResponseFormat::json_object()),
            })
            .await?;

        parse_analysis(&raw, &self.config.tag_vocabulary).map_err(|e| {
            warn!("Unparseable classifier output: {}", e);
            BrainError::InvalidResponse(format!("classifier output: {}", e))
        })
    }

    fn name(&self) -> &str {
        "LlmBrain"
    }
}

#[async_trait]
impl Speech for LlmBrain {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        mime_type: &str,
        language: &str,
    ) -> Result<String, BrainError> {
        let part = Part::bytes(audio)
            .file_name("voice.ogg")
            .mime_str(mime_type)
            .map_err(|e| BrainError::ProcessingFailed(format!("Invalid audio type: {}", e)))?;

        // The transcription API wants ISO-639-1 ("en"), not a locale ("en-US").
        let iso_language = language.split('-').next().unwrap_or(language).to_string();

        let form = Form::new()
            .part("file", part)
            .text("model", self.config.transcribe_model.clone())
            .text("language", iso_language);

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BrainError::Network(format!("Failed to send audio: {}", e)))?;

        let transcription: TranscriptionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BrainError::InvalidResponse(format!("Failed to parse transcription: {}", e)))?;

        let text = transcription.text.trim().to_string();
        if text.is_empty() {
            return Err(BrainError::ProcessingFailed("empty transcription".to_string()));
        }

        Ok(text)
    }

    async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>, BrainError> {
        let request = SpeechRequest {
            model: &self.config.tts_model,
            input: text,
            voice: &self.config.tts_voice,
            response_format: "opus",
        };

        let response = self
            .client
            .post(self.url("audio/speech"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| BrainError::Network(format!("Failed to request speech: {}", e)))?;

        let bytes = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(|e| BrainError::Network(format!("Failed to read audio: {}", e)))?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_path() {
        let brain = LlmBrain::new(
            LlmConfig::builder()
                .api_key("k")
                .api_url("http://localhost:11434/")
                .build(),
        )
        .unwrap();
        assert_eq!(brain.url("chat/completions"), "http://localhost:11434/v1/chat/completions");
        assert_eq!(Responder::name(&brain), "LlmBrain");
    }

    #[test]
    fn test_chat_message_roles() {
        use crate::api_types::ChatMessage;

        assert_eq!(ChatMessage::system("a").role, "system");
        assert_eq!(ChatMessage::user("b").role, "user");
    }
}
