//! Error types for collaborator calls.

use thiserror::Error;

/// Errors returned by AI and speech collaborators.
#[derive(Debug, Error)]
pub enum BrainError {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request could not reach the service.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with an error.
    #[error("processing failed: {0}")]
    ProcessingFailed(String),

    /// The service answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The collaborator is temporarily unavailable.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish in time.
    #[error("timed out")]
    Timeout,
}
