//! Classifier doubles.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use brain_core::{Analysis, BrainError, Classifier, Sentiment};

/// A classifier that always returns the same analysis.
#[derive(Debug)]
pub struct FixedClassifier {
    analysis: Analysis,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(analysis: Analysis) -> Self {
        Self {
            analysis,
            calls: AtomicUsize::new(0),
        }
    }

    /// Shorthand for a classifier returning `sentiment` and `tags`.
    pub fn with(sentiment: Sentiment, tags: &[&str], confidence: f64) -> Self {
        Self::new(Analysis::new(
            sentiment,
            tags.iter().map(|t| t.to_string()).collect(),
            confidence,
        ))
    }

    /// Number of `analyze` calls made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FixedClassifier {
    fn default() -> Self {
        Self::new(Analysis::empty())
    }
}

#[async_trait]
impl Classifier for FixedClassifier {
    async fn analyze(&self, _text: &str) -> Result<Analysis, BrainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.analysis.clone())
    }

    fn name(&self) -> &str {
        "FixedClassifier"
    }
}

/// A classifier that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingClassifier;

#[async_trait]
impl Classifier for FailingClassifier {
    async fn analyze(&self, _text: &str) -> Result<Analysis, BrainError> {
        Err(BrainError::Network("classifier unreachable".to_string()))
    }

    fn name(&self) -> &str {
        "FailingClassifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_classifier_counts_calls() {
        let classifier = FixedClassifier::with(Sentiment::Positive, &["Hope"], 0.9);
        let analysis = classifier.analyze("anything").await.unwrap();
        assert_eq!(analysis.sentiment, Sentiment::Positive);
        assert_eq!(analysis.tags, vec!["Hope".to_string()]);
        classifier.analyze("again").await.unwrap();
        assert_eq!(classifier.calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_classifier() {
        assert!(FailingClassifier.analyze("x").await.is_err());
    }
}
