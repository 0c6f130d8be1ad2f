//! Configuration for LlmBrain.

use brain_core::BrainError;
use std::env;

/// Configuration for LlmBrain.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base API URL (without `/v1`).
    pub api_url: String,

    /// API key for authentication.
    pub api_key: String,

    /// Model used for conversational replies.
    pub model: String,

    /// Model used for classification.
    pub classifier_model: String,

    /// Maximum tokens for replies.
    pub max_tokens: Option<u32>,

    /// Temperature for replies (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Speech-to-text model.
    pub transcribe_model: String,

    /// Text-to-speech model.
    pub tts_model: String,

    /// Text-to-speech voice.
    pub tts_voice: String,

    /// Tags the classifier may choose from. Empty lets it choose freely.
    pub tag_vocabulary: Vec<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            classifier_model: "gpt-4o-mini".to_string(),
            max_tokens: Some(512),
            temperature: Some(0.7),
            transcribe_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tag_vocabulary: Vec::new(),
        }
    }
}

impl LlmConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `LLM_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `LLM_API_URL` - API URL (default: https://api.openai.com)
    /// - `LLM_MODEL` - Reply model (default: gpt-4o-mini)
    /// - `LLM_CLASSIFIER_MODEL` - Classification model (default: `LLM_MODEL`)
    /// - `LLM_MAX_TOKENS` - Max reply tokens (default: 512)
    /// - `LLM_TEMPERATURE` - Reply temperature (default: 0.7)
    /// - `LLM_TRANSCRIBE_MODEL` - Speech-to-text model (default: whisper-1)
    /// - `LLM_TTS_MODEL` - Text-to-speech model (default: tts-1)
    /// - `LLM_TTS_VOICE` - Text-to-speech voice (default: alloy)
    /// - `LLM_TAGS` - Comma-separated tag vocabulary for the classifier
    pub fn from_env() -> Result<Self, BrainError> {
        let defaults = Self::default();

        let api_key = env::var("LLM_API_KEY")
            .map_err(|_| BrainError::Configuration("LLM_API_KEY not set".to_string()))?;

        let api_url = env::var("LLM_API_URL").unwrap_or(defaults.api_url);

        let model = env::var("LLM_MODEL").unwrap_or(defaults.model);

        let classifier_model = env::var("LLM_CLASSIFIER_MODEL").unwrap_or_else(|_| model.clone());

        let max_tokens = env::var("LLM_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(defaults.max_tokens);

        let temperature = env::var("LLM_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(defaults.temperature);

        let transcribe_model = env::var("LLM_TRANSCRIBE_MODEL").unwrap_or(defaults.transcribe_model);
        let tts_model = env::var("LLM_TTS_MODEL").unwrap_or(defaults.tts_model);
        let tts_voice = env::var("LLM_TTS_VOICE").unwrap_or(defaults.tts_voice);

        let tag_vocabulary = env::var("LLM_TAGS")
            .map(|v| parse_list(&v))
            .unwrap_or_default();

        Ok(Self {
            api_url,
            api_key,
            model,
            classifier_model,
            max_tokens,
            temperature,
            transcribe_model,
            tts_model,
            tts_voice,
            tag_vocabulary,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> LlmConfigBuilder {
        LlmConfigBuilder::default()
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builder for LlmConfig.
#[derive(Debug, Default)]
pub struct LlmConfigBuilder {
    config: LlmConfig,
}

impl LlmConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the API URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the reply model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the classifier model.
    pub fn classifier_model(mut self, model: impl Into<String>) -> Self {
        self.config.classifier_model = model.into();
        self
    }

    /// Set the max tokens.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = Some(tokens);
        self
    }

    /// Set the temperature.
    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    /// Restrict classifier tags to a vocabulary.
    pub fn tag_vocabulary(mut self, tags: Vec<String>) -> Self {
        self.config.tag_vocabulary = tags;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> LlmConfig {
        self.config
    }
}
