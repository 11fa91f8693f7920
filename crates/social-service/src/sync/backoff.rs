//! Reconnect backoff: exponential ceiling with full jitter

use rand::Rng;
use social_common::SyncConfig;
use std::time::Duration;

/// Delay schedule between reconnect attempts of a live view.
///
/// Attempt `n` (1-based) waits a uniformly random duration in
/// `[0, min(cap, base * 2^(n-1))]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    /// Consecutive failed attempts before a view gives up
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.backoff_base(),
            config.backoff_cap(),
            config.max_reconnect_attempts,
        )
    }

    /// Upper bound of the delay before attempt `attempt`
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        self.base.saturating_mul(1u32 << exp).min(self.cap)
    }

    /// Jittered delay before attempt `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = u64::try_from(self.ceiling(attempt).as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }

    /// Check if `attempts` consecutive failures exhaust the policy
    #[inline]
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}
