//! Collaborator traits.

use async_trait::async_trait;

use crate::analysis::Analysis;
use crate::error::BrainError;
use crate::reply::ReplyRequest;

/// Generates conversational replies.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply for the request.
    async fn reply(&self, request: ReplyRequest) -> Result<String, BrainError>;

    /// Human-readable name, used in logs.
    fn name(&self) -> &str;
}

/// Estimates sentiment and topical tags for a message.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<Analysis, BrainError>;

    fn name(&self) -> &str;
}

/// Speech-to-text and text-to-speech.
#[async_trait]
pub trait Speech: Send + Sync {
    /// Transcribe audio bytes (`mime_type` as delivered by the platform).
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        mime_type: &str,
        language: &str,
    ) -> Result<String, BrainError>;

    /// Synthesize speech; returns audio bytes in OGG/Opus.
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, BrainError>;
}
