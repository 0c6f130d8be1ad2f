//! Engine and scheduler configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Phrases that escalate a conversation to a person.
pub const DEFAULT_HANDOFF_PHRASES: &[&str] = &[
    "talk to someone",
    "speak to a person",
    "pray with me",
    "need help",
    "counselor",
    "pastor",
    "imam",
    "spiritual guidance",
    "depression",
    "suicide",
    "anxiety",
    "crisis",
];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

fn parse_env<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

/// Like [`parse_env`], but zero is rejected.
fn parse_positive(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match parse_env(key, default)? {
        0 => Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
        }),
        n => Ok(n),
    }
}

/// Outbound retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts before giving up on the original content.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub base_backoff: Duration,
    /// Content at least this long gets one last try as the short fallback.
    pub fallback_min_chars: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1000),
            fallback_min_chars: 1000,
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor)
    }
}

/// Configuration for inbound handling and delivery.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a platform message ID is remembered.
    pub dedup_id_ttl: Duration,
    /// How long an identical text from the same sender counts as a repeat.
    pub dedup_content_ttl: Duration,
    /// Upper bound on entries in each dedup cache.
    pub dedup_max_entries: usize,
    /// Delay between the welcome message and day 1.
    pub first_content_delay: Duration,
    /// Delay between a day's content and its reflection prompt.
    pub reflection_delay: Duration,
    /// Bound on classifier and speech calls.
    pub collaborator_timeout: Duration,
    pub retry: RetryPolicy,
    pub handoff_phrases: Vec<String>,
    /// Country code added to local WhatsApp numbers.
    pub default_country_code: Option<String>,
    /// Base URL that stored media references are resolved against.
    pub media_base_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedup_id_ttl: Duration::from_secs(300),
            dedup_content_ttl: Duration::from_secs(60),
            dedup_max_entries: 10_000,
            first_content_delay: Duration::from_secs(10),
            reflection_delay: Duration::from_secs(120),
            collaborator_timeout: Duration::from_secs(20),
            retry: RetryPolicy::default(),
            handoff_phrases: DEFAULT_HANDOFF_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            default_country_code: None,
            media_base_url: None,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `DEDUP_ID_TTL_SECS` - Message ID memory (default: 300)
    /// - `DEDUP_CONTENT_TTL_SECS` - Identical text window (default: 60)
    /// - `DEDUP_MAX_ENTRIES` - Cache bound (default: 10000)
    /// - `FIRST_CONTENT_DELAY_SECS` - Welcome to day 1 delay (default: 10)
    /// - `REFLECTION_DELAY_SECS` - Content to reflection prompt delay (default: 120)
    /// - `COLLABORATOR_TIMEOUT_SECS` - Classifier/speech timeout (default: 20)
    /// - `SEND_MAX_ATTEMPTS` - Send attempts (default: 3)
    /// - `SEND_BACKOFF_MS` - First retry delay (default: 1000)
    /// - `FALLBACK_MIN_CHARS` - Fallback threshold (default: 1000)
    /// - `HANDOFF_PHRASES` - Comma-separated phrases (default: built-in list)
    /// - `DEFAULT_COUNTRY_CODE` - For local WhatsApp numbers (default: none)
    /// - `MEDIA_BASE_URL` - Base for stored media references (default: none)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let handoff_phrases = match env::var("HANDOFF_PHRASES") {
            Ok(list) => list
                .split(',')
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            Err(_) => defaults.handoff_phrases,
        };

        Ok(Self {
            dedup_id_ttl: Duration::from_secs(parse_env("DEDUP_ID_TTL_SECS", 300)?),
            dedup_content_ttl: Duration::from_secs(parse_env("DEDUP_CONTENT_TTL_SECS", 60)?),
            dedup_max_entries: parse_env("DEDUP_MAX_ENTRIES", 10_000)?,
            first_content_delay: Duration::from_secs(parse_env("FIRST_CONTENT_DELAY_SECS", 10)?),
            reflection_delay: Duration::from_secs(parse_env("REFLECTION_DELAY_SECS", 120)?),
            collaborator_timeout: Duration::from_secs(parse_env("COLLABORATOR_TIMEOUT_SECS", 20)?),
            retry: RetryPolicy {
                max_attempts: parse_env("SEND_MAX_ATTEMPTS", 3)?,
                base_backoff: Duration::from_millis(parse_env("SEND_BACKOFF_MS", 1000)?),
                fallback_min_chars: parse_env("FALLBACK_MIN_CHARS", 1000)?,
            },
            handoff_phrases,
            default_country_code: env::var("DEFAULT_COUNTRY_CODE").ok(),
            media_base_url: env::var("MEDIA_BASE_URL").ok(),
        })
    }
}

/// Configuration for the scheduler loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick: Duration,
    /// A lease not renewed for this long can be taken over.
    pub lease_staleness: Duration,
    pub lease_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
            lease_staleness: Duration::from_secs(30),
            lease_name: "scheduler".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `SCHEDULER_TICK_SECS` - Tick period (default: 60)
    /// - `LEASE_STALENESS_SECS` - Lease takeover threshold (default: 30)
    /// - `LEASE_NAME` - Lease row name (default: scheduler)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            tick: Duration::from_secs(parse_positive("SCHEDULER_TICK_SECS", 60)?),
            lease_staleness: Duration::from_secs(parse_positive("LEASE_STALENESS_SECS", 30)?),
            lease_name: env::var("LEASE_NAME").unwrap_or_else(|_| "scheduler".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_zero_period_rejected() {
        std::env::set_var("SCHEDULER_TICK_SECS", "0");
        let err = SchedulerConfig::from_env().unwrap_err();
        std::env::remove_var("SCHEDULER_TICK_SECS");
        assert!(matches!(err, ConfigError::Invalid { key: "SCHEDULER_TICK_SECS", .. }));

        std::env::set_var("LEASE_STALENESS_SECS", "0");
        let err = SchedulerConfig::from_env().unwrap_err();
        std::env::remove_var("LEASE_STALENESS_SECS");
        assert!(matches!(err, ConfigError::Invalid { key: "LEASE_STALENESS_SECS", .. }));

        assert!(parse_positive("JOURNEY_TEST_UNSET_PERIOD", 7).is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.dedup_id_ttl, Duration::from_secs(300));
        assert_eq!(config.dedup_content_ttl, Duration::from_secs(60));
        assert!(config.handoff_phrases.iter().any(|p| p == "need help"));

        let scheduler = SchedulerConfig::default();
        assert_eq!(scheduler.lease_name, "scheduler");
        assert_eq!(scheduler.lease_staleness, Duration::from_secs(30));
    }
}
