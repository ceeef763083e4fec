use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retry policy applied to every upstream POST.
///
/// Only transient failures are retried (see
/// [`UpstreamError::is_transient`](super::errors::UpstreamError::is_transient)).
///
/// # Example
///
/// ```
/// use balancer_core::upstream::retry::RetryPolicy;
///
/// let policy = RetryPolicy::default()
///     .with_max_attempts(3)
///     .with_base_delay_ms(100)
///     .with_max_delay_ms(2000);
/// assert!(policy.should_retry(1));
/// assert!(!policy.should_retry(3));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    ///
    /// Default: 3
    pub max_attempts: u32,

    /// Delay before the first retry; doubles for each further retry.
    ///
    /// Default: 100ms
    pub base_delay_ms: u64,

    /// Upper bound for the backoff delay.
    ///
    /// Default: 2000ms
    pub max_delay_ms: u64,

    /// Jitter factor (0.0-1.0). A value of 0.25 varies delays by ±12.5%.
    ///
    /// Default: 0.25
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 100, max_delay_ms: 2000, jitter_factor: 0.25 }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    #[must_use]
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    #[must_use]
    pub fn with_jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `retry` (1-based): `min(base * 2^(retry-1), max)` with jitter.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        use rand::Rng;

        let exponent = retry.saturating_sub(1).min(16);
        let base_delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        let capped_delay = base_delay.min(self.max_delay_ms);

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let jitter_range = (capped_delay as f64 * self.jitter_factor.clamp(0.0, 1.0)) as u64;
        let jitter_offset =
            if jitter_range > 0 { rand::rng().random_range(0..jitter_range) } else { 0 };

        Duration::from_millis(capped_delay.saturating_sub(jitter_range / 2) + jitter_offset)
    }

    /// Returns `true` if another attempt may follow `attempts_made` attempts.
    #[must_use]
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}
