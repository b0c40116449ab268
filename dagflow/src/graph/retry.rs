//! Per-step retry policies.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// delay = base
    #[default]
    Constant,
    /// delay = base * attempt
    Linear,
    /// delay = base * 2^(attempt - 1)
    Exponential,
}

/// Retry behavior for one step.
///
/// `max_attempts` counts total invocations of the unit of work: a step
/// with `max_attempts = 3` that always fails runs exactly three times
/// before transitioning to `Failed`. The delay between attempts is a
/// passive wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum invocations of the unit of work (at least 1).
    pub max_attempts: usize,
    /// Base delay between attempts in milliseconds.
    pub delay_ms: u64,
    /// Cap on any single delay in milliseconds.
    pub max_delay_ms: u64,
    /// Delay growth strategy.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff: Backoff::Constant,
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy (single attempt).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_delay_ms(mut self, delay: u64) -> Self {
        self.delay_ms = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns true once `attempt` invocations have been spent.
    #[must_use]
    pub fn is_exhausted(&self, attempt: usize) -> bool {
        attempt >= self.max_attempts
    }

    /// Returns the delay to wait after the given 1-based failed attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff {
            Backoff::Constant => self.delay_ms,
            Backoff::Linear => self.delay_ms.saturating_mul(attempt as u64),
            Backoff::Exponential => {
                let shift = u32::try_from(attempt - 1).unwrap_or(u32::MAX);
                self.delay_ms
                    .saturating_mul(2u64.saturating_pow(shift))
            }
        };
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_single_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 1);
        assert!(policy.is_exhausted(1));
    }

    #[test]
    fn test_builder() {
        let policy = RetryPolicy::new()
            .with_max_attempts(4)
            .with_delay_ms(250)
            .with_max_delay_ms(2000)
            .with_backoff(Backoff::Exponential);

        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_ms, 250);
        assert_eq!(policy.backoff, Backoff::Exponential);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let policy = RetryPolicy::new().with_max_attempts(0);
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_constant_delay() {
        let policy = RetryPolicy::new().with_delay_ms(100);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(5), Duration::from_millis(100));
    }

    #[test]
    fn test_linear_delay() {
        let policy = RetryPolicy::new()
            .with_delay_ms(100)
            .with_backoff(Backoff::Linear);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(3), Duration::from_millis(300));
    }

    #[test]
    fn test_exponential_delay_capped() {
        let policy = RetryPolicy::new()
            .with_delay_ms(1000)
            .with_max_delay_ms(5000)
            .with_backoff(Backoff::Exponential);
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_exhaustion() {
        let policy = RetryPolicy::new().with_max_attempts(3);
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }
}
