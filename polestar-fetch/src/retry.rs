//! Retry strategy for data API calls.

use std::time::Duration;

use crate::error::FetchError;

/// Most additional attempts a data call may make. Each attempt spends quota.
pub const MAX_RETRIES: u32 = 2;

/// Strategy for retrying failed requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStrategy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Whether to double the delay on each retry.
    pub exponential_backoff: bool,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryStrategy {
    /// Creates a strategy with `max_retries` extra attempts, at most
    /// [`MAX_RETRIES`].
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES),
            base_delay: Duration::from_millis(500),
            exponential_backoff: true,
            max_delay: Duration::from_secs(5),
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            exponential_backoff: false,
            max_delay: Duration::ZERO,
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Enables or disables exponential backoff.
    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }

    /// Sets the delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculates the delay before retry number `retry` (1-based).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let delay = if self.exponential_backoff {
            let factor = 2u32.saturating_pow(retry.saturating_sub(1));
            self.base_delay.saturating_mul(factor)
        } else {
            self.base_delay
        };

        delay.min(self.max_delay)
    }

    /// Determines if retry number `retry` (1-based) should be made after `error`.
    pub fn should_retry(&self, error: &FetchError, retry: u32) -> bool {
        retry <= self.max_retries.min(MAX_RETRIES) && error.is_transient()
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::new(MAX_RETRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn test_exponential_backoff() {
        let strategy = RetryStrategy::default();

        assert_eq!(strategy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(strategy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(strategy.delay_for_attempt(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_max_delay_cap() {
        let strategy = RetryStrategy::new(10).with_base_delay(Duration::from_secs(2));

        // 2 * 2^4 = 32s, capped
        assert_eq!(strategy.delay_for_attempt(5), Duration::from_secs(5));
    }

    #[test]
    fn test_linear_backoff() {
        let strategy = RetryStrategy::new(3).with_exponential_backoff(false);
        assert_eq!(strategy.delay_for_attempt(3), Duration::from_millis(500));
    }

    #[test]
    fn test_should_retry_bounded() {
        let strategy = RetryStrategy::default();
        let err = FetchError::Transport(TransportError::Network("reset".into()));

        assert!(strategy.should_retry(&err, 1));
        assert!(strategy.should_retry(&err, 2));
        assert!(!strategy.should_retry(&err, 3));
        assert!(!strategy.should_retry(&FetchError::Unauthorized, 1));
        assert!(!RetryStrategy::no_retry().should_retry(&err, 1));
    }

    #[test]
    fn test_retries_never_exceed_limit() {
        let err = FetchError::Transport(TransportError::Network("reset".into()));

        let strategy = RetryStrategy::new(10);
        assert_eq!(strategy.max_retries, MAX_RETRIES);
        assert!(!strategy.should_retry(&err, 3));

        let widened = RetryStrategy {
            max_retries: 10,
            ..RetryStrategy::default()
        };
        assert!(!widened.should_retry(&err, 3));
    }
}
