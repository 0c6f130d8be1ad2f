//! Error types for platform-client.

use thiserror::Error;

/// Errors that can occur when talking to a messaging platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The platform rejected the request.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The bot has no credentials for this platform.
    #[error("missing {0} credentials")]
    MissingCredentials(&'static str),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Webhook verification failed.
    #[error("webhook verification failed")]
    VerificationFailed,
}
