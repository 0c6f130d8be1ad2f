//! Conversational delivery engine.
//!
//! This crate turns chat-platform webhooks into journey progress for many
//! bots at once:
//!
//! - [`normalizer`] - WhatsApp and Telegram payloads to [`InboundMessage`]
//! - [`dedup`] - message-ID and content duplicate filtering
//! - [`router`] - commands, handoff phrases and journey routing
//! - [`journey`] - the per-user state machine, applied by compare-and-set
//! - [`classify`] and [`rules`] - statistical tags plus declarative rules
//! - [`delivery`] - outbound sends with retry and fallbacks
//! - [`scheduler`] and [`lease`] - single-owner scheduled day delivery
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use database::{Database, Platform};
//! use journey_engine::{Engine, EngineConfig, InboundMessage, LoggingSender, Normalized};
//! use mock_brain::{EchoResponder, FixedClassifier, ScriptedSpeech};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:journey.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let engine = Engine::new(
//!         db.pool().clone(),
//!         Arc::new(LoggingSender),
//!         Arc::new(EchoResponder::new()),
//!         Arc::new(FixedClassifier::default()),
//!         Arc::new(ScriptedSpeech::broken()),
//!         EngineConfig::from_env()?,
//!     );
//!
//!     let msg = InboundMessage::text(1, Platform::WhatsApp, "6281234567890", "START");
//!     engine.dispatch(Normalized::Message(msg)).await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod classify;
pub mod config;
pub mod day;
pub mod dedup;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod journey;
pub mod language;
pub mod lease;
pub mod normalizer;
pub mod router;
pub mod rules;
pub mod scheduler;
pub mod sender;
pub mod tagging;

#[cfg(test)]
mod testing;

pub use cache::{SeenCache, TtlCache};
pub use config::{ConfigError, EngineConfig, RetryPolicy, SchedulerConfig};
pub use day::DayOutcome;
pub use dedup::DuplicateFilter;
pub use delivery::{DeliveryAdapter, DeliveryMode, DeliveryReport};
pub use engine::{Engine, Handled, Outcome};
pub use error::{EngineError, Result};
pub use journey::{JourneyEvent, Transition};
pub use lease::LeaseCoordinator;
pub use normalizer::{normalize_telegram, normalize_whatsapp, InboundMessage, Normalized};
pub use scheduler::{Scheduler, TickReport};
pub use sender::{LoggingSender, PlatformSender, RecordingSender, Sent, Target};
pub use tagging::{retag_bot, retag_message, RetagReport};
