//! Exponential backoff policy and per-key retry bookkeeping.

use std::time::Duration;

/// Default number of retries before a key is given up on.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Decides whether and when a failed subscription is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,

    /// Retries allowed before the key is exhausted.
    pub max_attempts: u32,

    /// Optional upper clamp on a single delay (None = unbounded).
    pub max_delay: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_delay: None,
        }
    }
}

impl BackoffPolicy {
    /// Delay after `attempts` previous failures: `base * 2^attempts`.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let factor = 1u32.checked_shl(attempts).unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// What to do after an error, given the attempts already made.
    pub fn next(&self, attempts: u32) -> RetryDecision {
        if attempts >= self.max_attempts {
            RetryDecision::Exhausted
        } else {
            RetryDecision::Retry {
                attempt: attempts + 1,
                delay: self.delay_for(attempts),
            }
        }
    }
}

/// Outcome of consulting the policy after a channel error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule retry number `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Give up on the key.
    Exhausted,
}

/// Retry counter for one key. Exists only while errors persist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempts: u32,
}
