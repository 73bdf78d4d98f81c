//! Retry Policy
//!
//! Linear backoff: after failed attempt `k` the connector waits
//! `k * base_delay` before attempt `k + 1`.

use std::time::Duration;

use crate::error::{ConnectorError, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded linear retry policy for a single connect cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            attempt_timeout,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ConnectorError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_delay.is_zero() {
            return Err(ConnectorError::InvalidConfig(
                "base_delay must be non-zero".to_string(),
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(ConnectorError::InvalidConfig(
                "attempt_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay to wait after `failed_attempt` (1-based) before the next one,
    /// or `None` when the budget is spent
    pub fn delay_after(&self, failed_attempt: u32) -> Option<Duration> {
        if failed_attempt >= self.max_attempts {
            return None;
        }
        Some(self.base_delay.saturating_mul(failed_attempt))
    }

    /// Delay inserted before `attempt` (1-based); zero for the first
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.saturating_sub(1))
    }

    /// Offset of `attempt` from the start of the cycle, ignoring attempt durations
    pub fn schedule_offset(&self, attempt: u32) -> Duration {
        (1..=attempt)
            .map(|k| self.delay_before(k))
            .fold(Duration::ZERO, |acc, d| acc.saturating_add(d))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY, DEFAULT_ATTEMPT_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.attempt_timeout, Duration::from_secs(10));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_linear_delays_strictly_increase() {
        let policy = RetryPolicy::new(6, Duration::from_millis(250), Duration::from_secs(1));

        for k in 3..=6 {
            assert!(policy.delay_before(k) > policy.delay_before(k - 1));
        }
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(4), Duration::from_millis(750));
    }

    #[test]
    fn test_budget_exhaustion() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn test_schedule_matches_example() {
        // attempts at t=0, t=1, t=3
        let policy = RetryPolicy::default();
        assert_eq!(policy.schedule_offset(1), Duration::ZERO);
        assert_eq!(policy.schedule_offset(2), Duration::from_secs(1));
        assert_eq!(policy.schedule_offset(3), Duration::from_secs(3));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let policy = RetryPolicy::new(0, DEFAULT_BASE_DELAY, DEFAULT_ATTEMPT_TIMEOUT);
        assert!(matches!(policy.validate(), Err(ConnectorError::InvalidConfig(_))));
    }
}
