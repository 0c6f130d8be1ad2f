//! Error types for engine operations.

use brain_core::BrainError;
use database::DatabaseError;
use thiserror::Error;

/// Errors that can occur while handling a message or a delivery.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Persistence failed.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// A collaborator failed.
    #[error("brain error: {0}")]
    Brain(#[from] BrainError),

    /// The platform rejected or never received a send.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Media could not be fetched from the platform.
    #[error("media download failed: {0}")]
    MediaFailed(String),

    /// A conditional user write kept losing to concurrent writers.
    #[error("user {user_id} changed concurrently")]
    Conflict { user_id: i64 },

    /// The request does not make sense for the target.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
