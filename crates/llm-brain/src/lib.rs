//! OpenAI-compatible collaborators for the journey engine.
//!
//! [`LlmBrain`] implements all three `brain-core` traits against a single
//! OpenAI-compatible endpoint:
//!
//! - `Responder` via `/v1/chat/completions`, with the bot persona as system
//!   prompt and the day's content as grounding context
//! - `Classifier` via `/v1/chat/completions` in JSON mode
//! - `Speech` via `/v1/audio/transcriptions` and `/v1/audio/speech`
//!
//! # Usage
//!
//! ```rust,no_run
//! use llm_brain::LlmBrain;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let brain = LlmBrain::from_env()?;
//!     // Hand `brain` to the engine as responder, classifier and speech service.
//!     Ok(())
//! }
//! ```

mod api_types;
mod brain;
mod config;
mod prompt;

pub use brain::LlmBrain;
pub use config::{LlmConfig, LlmConfigBuilder};

// Re-export brain-core types for convenience
pub use brain_core::{Analysis, BrainError, Classifier, ReplyRequest, Responder, Sentiment, Speech};
