//! Statistical pass of the classification pipeline.
//!
//! The external classifier is bounded by a timeout. Any failure falls back
//! to [`keyword_analysis`], so classification never fails outward.

use std::time::Duration;

use brain_core::{Analysis, Classifier, Sentiment};
use tokio::time::timeout;
use tracing::warn;

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "love", "peace", "hope", "beautiful", "amazing", "wonderful", "blessed",
    "grateful", "thank", "inspiring",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "hate", "sad", "angry", "confused", "difficult", "hard", "doubt", "worry", "fear",
];

const QUESTION_MARKERS: &[&str] = &["question", "why", "how", "what", "?"];

const DOUBT_MARKERS: &[&str] = &["doubt", "confused", "unsure"];

/// Confidence of a keyword estimate that matched something.
pub const KEYWORD_CONFIDENCE: f64 = 0.6;

/// Confidence of a keyword estimate that matched nothing.
pub const BASELINE_CONFIDENCE: f64 = 0.3;

/// Local keyword-count estimate.
pub fn keyword_analysis(text: &str) -> Analysis {
    let lower = text.to_lowercase();
    let count = |words: &[&str]| words.iter().filter(|w| lower.contains(*w)).count();

    let positive = count(POSITIVE_WORDS);
    let negative = count(NEGATIVE_WORDS);

    let sentiment = match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => Sentiment::Positive,
        std::cmp::Ordering::Less => Sentiment::Negative,
        std::cmp::Ordering::Equal => Sentiment::Neutral,
    };

    let mut tags = Vec::new();
    let asks = count(QUESTION_MARKERS) > 0;
    let doubts = count(DOUBT_MARKERS) > 0;
    if asks {
        tags.push("Question".to_string());
    }
    if doubts {
        tags.push("Doubt".to_string());
    }
    match sentiment {
        Sentiment::Positive => tags.push("Positive Feedback".to_string()),
        Sentiment::Negative => tags.push("Negative Feedback".to_string()),
        Sentiment::Neutral => {}
    }

    let matched = positive + negative > 0 || asks || doubts;
    let confidence = if matched {
        KEYWORD_CONFIDENCE
    } else {
        BASELINE_CONFIDENCE
    };

    Analysis::new(sentiment, tags, confidence)
}

/// Classify with the collaborator, falling back to keywords.
pub async fn analyze(classifier: &dyn Classifier, text: &str, limit: Duration) -> Analysis {
    match timeout(limit, classifier.analyze(text)).await {
        Ok(Ok(analysis)) => Analysis::new(analysis.sentiment, analysis.tags, analysis.confidence),
        Ok(Err(e)) => {
            warn!("Classifier {} failed, using keywords: {}", classifier.name(), e);
            keyword_analysis(text)
        }
        Err(_) => {
            warn!(
                "Classifier {} timed out after {:?}, using keywords",
                classifier.name(),
                limit
            );
            keyword_analysis(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_brain::{DelayedClassifier, FailingClassifier, FixedClassifier};

    #[test]
    fn test_keyword_sentiment() {
        let positive = keyword_analysis("This gave me peace and hope");
        assert_eq!(positive.sentiment, Sentiment::Positive);
        assert_eq!(positive.tags, vec!["Positive Feedback".to_string()]);
        assert_eq!(positive.confidence, KEYWORD_CONFIDENCE);

        let negative = keyword_analysis("I'm confused, why is this so hard?");
        assert_eq!(negative.sentiment, Sentiment::Negative);
        assert_eq!(
            negative.tags,
            vec![
                "Question".to_string(),
                "Doubt".to_string(),
                "Negative Feedback".to_string()
            ]
        );
    }

    #[test]
    fn test_keyword_nothing_matched() {
        let neutral = keyword_analysis("ok");
        assert_eq!(neutral.sentiment, Sentiment::Neutral);
        assert!(neutral.tags.is_empty());
        assert_eq!(neutral.confidence, BASELINE_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_collaborator_result_used() {
        let classifier = FixedClassifier::with(Sentiment::Positive, &["Prayer"], 0.9);
        let analysis = analyze(&classifier, "anything", Duration::from_secs(1)).await;
        assert_eq!(analysis.tags, vec!["Prayer".to_string()]);
        assert_eq!(analysis.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_failure_falls_back() {
        let analysis = analyze(&FailingClassifier, "I love this", Duration::from_secs(1)).await;
        assert_eq!(analysis.sentiment, Sentiment::Positive);
        assert_eq!(analysis.confidence, KEYWORD_CONFIDENCE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let slow = DelayedClassifier::with_secs(
            FixedClassifier::with(Sentiment::Negative, &["Slow"], 0.99),
            30,
        );
        let analysis = analyze(&slow, "thank you", Duration::from_secs(5)).await;
        assert_eq!(analysis.sentiment, Sentiment::Positive);
        assert!(!analysis.tags.contains(&"Slow".to_string()));
    }
}
