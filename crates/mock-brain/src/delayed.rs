//! Delayed classifier - wraps another classifier with artificial delay.

use std::time::Duration;

use brain_core::{async_trait, Analysis, BrainError, Classifier};
use tokio::time::sleep;

/// A classifier that wraps another classifier and adds artificial delay.
///
/// Useful for testing collaborator timeouts.
pub struct DelayedClassifier<C: Classifier> {
    inner: C,
    delay: Duration,
}

impl<C: Classifier> DelayedClassifier<C> {
    /// Create a new DelayedClassifier wrapping `inner` with the given delay.
    pub fn new(inner: C, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Create a classifier with a delay in milliseconds.
    pub fn with_millis(inner: C, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }

    /// Create a classifier with a delay in seconds.
    pub fn with_secs(inner: C, secs: u64) -> Self {
        Self::new(inner, Duration::from_secs(secs))
    }
}

#[async_trait]
impl<C: Classifier> Classifier for DelayedClassifier<C> {
    async fn analyze(&self, text: &str) -> Result<Analysis, BrainError> {
        sleep(self.delay).await;
        self.inner.analyze(text).await
    }

    fn name(&self) -> &str {
        "DelayedClassifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedClassifier;

    #[tokio::test(start_paused = true)]
    async fn test_delayed_classifier() {
        let classifier = DelayedClassifier::with_secs(FixedClassifier::default(), 5);

        let start = tokio::time::Instant::now();
        classifier.analyze("test").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_classifier_name() {
        let classifier = DelayedClassifier::with_millis(FixedClassifier::default(), 0);
        assert_eq!(classifier.name(), "DelayedClassifier");
    }
}
