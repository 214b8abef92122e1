//! Explicit retry policy for completion calls.
//!
//! The policy wraps exactly the network call and nothing else: retries
//! happen strictly before any tool call is dispatched, so a retried
//! completion can never double-execute a tool.

use std::time::Duration;

use super::types::ModelError;

/// Bounded exponential backoff applied to transport-transient failures only.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Whether a failed attempt (0-based) should be retried.
    pub fn should_retry(&self, error: &ModelError, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts && error.is_transient()
    }

    /// Delay before the retry following the given attempt: base doubled per
    /// attempt, capped at `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(30);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }

    /// Delay for retrying a specific failure. A rate-limit `Retry-After`
    /// hint can raise the backoff, but never past `max_delay`.
    pub fn delay_for(&self, error: &ModelError, attempt: u32) -> Duration {
        let mut delay = self.delay(attempt);
        if let ModelError::RateLimited {
            retry_after: Some(seconds),
        } = error
        {
            delay = delay.max(Duration::from_secs(*seconds));
        }
        delay.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(10), Duration::from_secs(8));
    }

    #[test]
    fn transient_errors_retry_until_attempts_exhausted() {
        let policy = RetryPolicy::default();
        let error = ModelError::Timeout(Duration::from_secs(30));
        assert!(policy.should_retry(&error, 0));
        assert!(policy.should_retry(&error, 1));
        assert!(!policy.should_retry(&error, 2));
    }

    #[test]
    fn retry_after_hint_raises_delay_within_the_cap() {
        let policy = RetryPolicy::default();

        let hinted = ModelError::RateLimited {
            retry_after: Some(3),
        };
        assert_eq!(policy.delay_for(&hinted, 0), Duration::from_secs(3));

        let huge = ModelError::RateLimited {
            retry_after: Some(600),
        };
        assert_eq!(policy.delay_for(&huge, 0), policy.max_delay);

        let plain = ModelError::Timeout(Duration::from_secs(30));
        assert_eq!(policy.delay_for(&plain, 1), Duration::from_secs(1));
    }

    #[test]
    fn protocol_errors_are_never_retried() {
        let policy = RetryPolicy::default();
        let error = ModelError::InvalidResponse("no choices".into());
        assert!(!policy.should_retry(&error, 0));
    }
}
