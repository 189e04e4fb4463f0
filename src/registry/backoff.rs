//! Reconnect backoff schedule.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::duration_ms;

// ============================================================================
// BackoffPolicy
// ============================================================================

/// Exponential backoff with equal jitter and a bounded attempt count.
///
/// Attempt `n` (1-based) waits `min(base * 2^(n-1), max)`; with jitter the
/// wait is drawn uniformly from the upper half of that ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    #[serde(with = "duration_ms", rename = "base_delay_ms")]
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    #[serde(with = "duration_ms", rename = "max_delay_ms")]
    pub max_delay: Duration,
    /// Retries before giving up.
    pub max_attempts: u32,
    /// Randomize delays.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy without jitter.
    #[must_use]
    pub const fn fixed(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
            jitter: false,
        }
    }

    /// Returns the un-jittered delay for `attempt`.
    #[must_use]
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Returns the delay to wait before `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let floor = ceiling / 2;
        let spread = ceiling - floor;
        let spread_nanos = u64::try_from(spread.as_nanos()).unwrap_or(u64::MAX);
        floor + Duration::from_nanos(rand::thread_rng().gen_range(0..=spread_nanos))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.max_attempts, 5);
        assert!(policy.jitter);
    }

    #[test]
    fn test_ceiling_doubles_then_caps() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(100), Duration::from_millis(700), 10);
        assert_eq!(policy.ceiling(1), Duration::from_millis(100));
        assert_eq!(policy.ceiling(2), Duration::from_millis(200));
        assert_eq!(policy.ceiling(3), Duration::from_millis(400));
        assert_eq!(policy.ceiling(4), Duration::from_millis(700));
        assert_eq!(policy.ceiling(60), Duration::from_millis(700));
    }

    #[test]
    fn test_fixed_policy_has_no_jitter() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(50), Duration::from_secs(1), 3);
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
    }

    #[test]
    fn test_serde_uses_milliseconds() {
        let policy: BackoffPolicy =
            serde_json::from_str(r#"{"base_delay_ms":250,"max_attempts":2}"#).unwrap();
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.max_attempts, 2);
    }

    proptest! {
        #[test]
        fn prop_jittered_delay_within_half_ceiling(
            base_ms in 1u64..5_000,
            max_ms in 1u64..60_000,
            attempt in 1u32..40,
        ) {
            let policy = BackoffPolicy {
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(max_ms),
                max_attempts: 5,
                jitter: true,
            };
            let ceiling = policy.ceiling(attempt);
            let delay = policy.delay_for(attempt);
            prop_assert!(delay <= ceiling);
            prop_assert!(delay >= ceiling / 2);
            prop_assert!(ceiling <= policy.max_delay);
        }
    }
}
