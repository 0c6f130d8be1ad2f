//! Reply request types.

use serde::{Deserialize, Serialize};

/// The day's content used to ground a contextual reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayContext {
    pub day_number: i64,
    pub title: String,
    pub body: String,
    pub reflection_prompt: Option<String>,
}

/// Everything a [`Responder`](crate::Responder) needs to answer one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRequest {
    /// Stable per-user key, usable for conversation memory.
    pub sender: String,
    /// Bot persona / system prompt.
    pub persona: String,
    /// The user's message.
    pub message: String,
    /// Day content, when the reply should be grounded in the journey.
    pub context: Option<DayContext>,
    /// Bot language name (e.g. "English").
    pub language: String,
}

impl ReplyRequest {
    /// A reply request without day context.
    pub fn general(
        sender: impl Into<String>,
        persona: impl Into<String>,
        message: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            persona: persona.into(),
            message: message.into(),
            context: None,
            language: language.into(),
        }
    }

    /// Attach day content as context.
    pub fn with_context(mut self, context: DayContext) -> Self {
        self.context = Some(context);
        self
    }
}
