//! Collaborator traits and shared types for the journey engine.
//!
//! The engine never talks to an AI or speech vendor directly. It depends on
//! the traits defined here:
//!
//! - [`Responder`] - generates a conversational reply for a user message
//! - [`Classifier`] - estimates sentiment, topical tags and confidence
//! - [`Speech`] - transcribes voice notes and synthesizes spoken replies
//!
//! along with the value types that cross those seams ([`Analysis`],
//! [`Sentiment`], [`ReplyRequest`]) and the shared [`BrainError`].
//!
//! # Example
//!
//! ```rust
//! use brain_core::{async_trait, BrainError, ReplyRequest, Responder};
//!
//! struct Polite;
//!
//! #[async_trait]
//! impl Responder for Polite {
//!     async fn reply(&self, request: ReplyRequest) -> Result<String, BrainError> {
//!         Ok(format!("Thanks for writing: {}", request.message))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Polite"
//!     }
//! }
//! ```

mod analysis;
mod error;
mod reply;
mod traits;

pub use analysis::{Analysis, Sentiment};
pub use error::BrainError;
pub use reply::{DayContext, ReplyRequest};
pub use traits::{Classifier, Responder, Speech};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
