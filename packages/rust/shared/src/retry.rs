//! Retry policy for transient failures.
//!
//! The policy only decides; callers own the loop and the sleeping.

use std::time::Duration;

use crate::config::{AppConfig, RetryConfig};
use crate::error::{ErrorKind, LinkScoutError};

/// Decides whether a failed attempt should be retried and how long to wait.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
    /// Error kinds eligible for retry. The error must also be transient.
    pub retryable: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier.max(1.0),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            retryable: vec![ErrorKind::Navigation, ErrorKind::Timeout],
        }
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(config: &AppConfig) -> Self {
        Self::from(&config.retry)
    }
}

impl RetryPolicy {
    /// Override the backoff bounds (mainly for tests).
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn should_retry(&self, err: &LinkScoutError, attempt: u32) -> bool {
        attempt < self.max_attempts && err.is_transient() && self.retryable.contains(&err.kind())
    }

    /// Delay before the attempt following `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_secs(1));
        assert_eq!(policy.max_backoff, Duration::from_secs(60));
    }

    #[test]
    fn retries_transient_until_exhausted() {
        let policy = RetryPolicy::default();
        let err = LinkScoutError::transient("HTTP 503");
        assert!(policy.should_retry(&err, 1));
        assert!(policy.should_retry(&err, 2));
        assert!(!policy.should_retry(&err, 3));
    }

    #[test]
    fn never_retries_non_transient() {
        let policy = RetryPolicy::default();
        let not_found = LinkScoutError::navigation("HTTP 404");
        let bad_card = LinkScoutError::Extraction("bad".into());
        assert!(!policy.should_retry(&not_found, 1));
        assert!(!policy.should_retry(&bad_card, 1));
    }

    #[test]
    fn timeout_is_retryable() {
        let policy = RetryPolicy::default();
        let err = LinkScoutError::timeout("navigate", Duration::from_millis(10));
        assert!(policy.should_retry(&err, 1));
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = RetryPolicy {
            max_backoff: Duration::from_millis(3000),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(3000));
        assert_eq!(policy.delay_for(10), Duration::from_millis(3000));
    }

    #[test]
    fn single_attempt_never_retries() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        assert!(!policy.should_retry(&LinkScoutError::transient("x"), 1));
    }
}
