//! Responder doubles.

use std::sync::Mutex;

use async_trait::async_trait;
use brain_core::{BrainError, ReplyRequest, Responder};

/// A responder that echoes the user's message back.
///
/// Every request is recorded so tests can assert on the context passed in.
#[derive(Debug, Default)]
pub struct EchoResponder {
    /// Optional prefix to add before the echo.
    prefix: Option<String>,
    requests: Mutex<Vec<ReplyRequest>>,
}

impl EchoResponder {
    /// Create a new EchoResponder with no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new EchoResponder with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ReplyRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Responder for EchoResponder {
    async fn reply(&self, request: ReplyRequest) -> Result<String, BrainError> {
        let text = match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, request.message),
            None => request.message.clone(),
        };

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        "EchoResponder"
    }
}

/// A responder that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingResponder;

#[async_trait]
impl Responder for FailingResponder {
    async fn reply(&self, _request: ReplyRequest) -> Result<String, BrainError> {
        Err(BrainError::Unavailable("responder offline".to_string()))
    }

    fn name(&self) -> &str {
        "FailingResponder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_core::DayContext;

    #[tokio::test]
    async fn test_echo_no_prefix() {
        let responder = EchoResponder::new();
        let reply = responder
            .reply(ReplyRequest::general("1555", "", "Hello!", "English"))
            .await
            .unwrap();
        assert_eq!(reply, "Hello!");
    }

    #[tokio::test]
    async fn test_echo_records_context() {
        let responder = EchoResponder::with_prefix("Echo: ");
        let request = ReplyRequest::general("1555", "persona", "Hi", "English").with_context(DayContext {
            day_number: 3,
            title: "Grace".to_string(),
            body: "Body".to_string(),
            reflection_prompt: None,
        });

        let reply = responder.reply(request).await.unwrap();
        assert_eq!(reply, "Echo: Hi");

        let seen = responder.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].context.as_ref().map(|c| c.day_number), Some(3));
    }

    #[tokio::test]
    async fn test_failing_responder() {
        let result = FailingResponder
            .reply(ReplyRequest::general("1555", "", "Hi", "English"))
            .await;
        assert!(matches!(result, Err(BrainError::Unavailable(_))));
        assert_eq!(FailingResponder.name(), "FailingResponder");
    }
}
