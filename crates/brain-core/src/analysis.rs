//! Classifier output types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coarse sentiment of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    /// Parse leniently, mapping anything unknown to `Neutral`.
    pub fn from_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(format!("unknown sentiment: {}", other)),
        }
    }
}

/// Result of analyzing one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub sentiment: Sentiment,
    pub tags: Vec<String>,
    /// Always within `[0, 1]`.
    pub confidence: f64,
}

impl Analysis {
    /// Build an analysis, clamping confidence into `[0, 1]`.
    pub fn new(sentiment: Sentiment, tags: Vec<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            sentiment,
            tags,
            confidence,
        }
    }

    /// A neutral, untagged analysis with zero confidence.
    pub fn empty() -> Self {
        Self::new(Sentiment::Neutral, Vec::new(), 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_parse() {
        assert_eq!("Positive".parse::<Sentiment>().unwrap(), Sentiment::Positive);
        assert_eq!(" negative ".parse::<Sentiment>().unwrap(), Sentiment::Negative);
        assert!("mixed".parse::<Sentiment>().is_err());
        assert_eq!(Sentiment::from_lenient("mixed"), Sentiment::Neutral);
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(Analysis::new(Sentiment::Neutral, vec![], 1.7).confidence, 1.0);
        assert_eq!(Analysis::new(Sentiment::Neutral, vec![], -0.2).confidence, 0.0);
        assert_eq!(Analysis::new(Sentiment::Neutral, vec![], f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_sentiment_serde() {
        let json = serde_json::to_string(&Sentiment::Negative).unwrap();
        assert_eq!(json, "\"negative\"");
    }
}
