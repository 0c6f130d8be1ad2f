//! Error types for the gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::DatabaseError;
use journey_engine::EngineError;
use platform_client::PlatformError;
use thiserror::Error;

/// Errors an HTTP handler can return.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Missing or wrong admin token.
    #[error("Unauthorized")]
    Unauthorized,

    /// Webhook verification failed.
    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Database(DatabaseError::NotFound { .. })
            | GatewayError::Engine(EngineError::Database(DatabaseError::NotFound { .. }))
            | GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Engine(EngineError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            GatewayError::Platform(PlatformError::MissingCredentials(_)) => StatusCode::NOT_FOUND,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden | GatewayError::Platform(PlatformError::VerificationFailed) => {
                StatusCode::FORBIDDEN
            }
            GatewayError::Database(_) | GatewayError::Engine(_) | GatewayError::Platform(_) => {
                tracing::error!("Request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for gateway handlers.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let missing = GatewayError::Database(DatabaseError::NotFound {
            entity: "Bot",
            id: "9".to_string(),
        });
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(GatewayError::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GatewayError::Platform(PlatformError::VerificationFailed)
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::Engine(EngineError::InvalidRequest("outgoing".to_string()))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }
}
