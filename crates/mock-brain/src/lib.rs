//! Collaborator doubles for the journey engine.
//!
//! This crate provides deterministic implementations of the `brain-core`
//! traits for tests:
//! - `EchoResponder` - echoes the message back, optionally with a prefix
//! - `FailingResponder` - always errors
//! - `FixedClassifier` / `FailingClassifier` - canned or failing analysis
//! - `DelayedClassifier` - wraps a classifier with artificial latency
//! - `ScriptedSpeech` - canned transcription and synthesis
//!
//! For production, use the `llm-brain` crate instead.
//!
//! # Example
//!
//! ```rust
//! use mock_brain::{EchoResponder, ReplyRequest, Responder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_brain::BrainError> {
//!     let responder = EchoResponder::with_prefix("You said: ");
//!     let reply = responder
//!         .reply(ReplyRequest::general("15551234567", "", "Hello!", "English"))
//!         .await?;
//!     assert_eq!(reply, "You said: Hello!");
//!     Ok(())
//! }
//! ```

mod classifier;
mod delayed;
mod responder;
mod speech;

// Re-export brain-core types for convenience
pub use brain_core::{
    async_trait, Analysis, BrainError, Classifier, ReplyRequest, Responder, Sentiment, Speech,
};

pub use classifier::{FailingClassifier, FixedClassifier};
pub use delayed::DelayedClassifier;
pub use responder::{EchoResponder, FailingResponder};
pub use speech::ScriptedSpeech;
