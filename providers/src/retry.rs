//! Upload retry policy: exponential backoff with additive jitter.
//!
//! # Retry Policy
//!
//! - Attempts: configured per tenant (default 5)
//! - Initial delay: default 5 seconds
//! - Max delay: default 5 minutes
//! - Jitter: up-jitter of up to 50% of the capped base delay
//!
//! The delay before attempt `n` (1-based, no delay before attempt 0) is
//! `base + random(0, 0.5 * base)` where `base = initial * 2^(n-1)`, capped
//! at the configured maximum before jitter is added. The retry loop itself
//! lives with the orchestrator; this module only owns the arithmetic and the
//! sleep seam.

use std::future::Future;
use std::time::Duration;

/// Retry envelope for one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff base before the first retry.
    pub initial_delay: Duration,
    /// Cap applied to the exponential base (jitter is added on top).
    pub max_delay: Duration,
}

impl RetryConfig {
    #[must_use]
    pub const fn new(max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5, 5_000, 300_000)
    }
}

/// Backoff delay before the given retry attempt (1-based).
///
/// Attempt 0 never sleeps; callers ask for a delay only when `attempt >= 1`.
#[must_use]
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    debug_assert!(attempt >= 1, "attempt 0 has no backoff delay");
    let exponent = attempt.saturating_sub(1).min(31) as i32;
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Up-jitter spreads simultaneous dispatches apart instead of shortening
    // the wait: delay in [capped, 1.5 * capped].
    let jitter = rand::random::<f64>() * 0.5 * capped;
    Duration::from_secs_f64(capped + jitter)
}

/// Sleep seam for the orchestrator's inter-attempt waits.
///
/// Tests substitute a counting sleeper so "zero sleeps on a non-retryable
/// failure" is assertable without waiting.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_ms(initial: u64, max: u64) -> RetryConfig {
        RetryConfig::new(5, initial, max)
    }

    #[test]
    fn backoff_doubles_per_attempt_within_jitter_window() {
        let config = config_ms(1_000, 60_000);

        // Attempt 1: base 1000ms, delay in [1000ms, 1500ms].
        for _ in 0..100 {
            let delay = backoff_delay(1, &config);
            assert!(delay >= Duration::from_millis(1_000));
            assert!(delay <= Duration::from_millis(1_500));
        }

        // Attempt 3: base 4000ms, delay in [4000ms, 6000ms].
        for _ in 0..100 {
            let delay = backoff_delay(3, &config);
            assert!(delay >= Duration::from_millis(4_000));
            assert!(delay <= Duration::from_millis(6_000));
        }
    }

    #[test]
    fn backoff_caps_base_at_max_delay() {
        let config = config_ms(5_000, 20_000);

        // Attempt 4 would be 40s uncapped; the base is capped at 20s and
        // jitter keeps it under 30s.
        for _ in 0..100 {
            let delay = backoff_delay(4, &config);
            assert!(delay >= Duration::from_secs(20));
            assert!(delay <= Duration::from_secs(30));
        }
    }

    #[test]
    fn large_attempt_numbers_do_not_overflow() {
        let config = config_ms(5_000, 300_000);
        let delay = backoff_delay(u32::MAX, &config);
        assert!(delay >= Duration::from_secs(300));
        assert!(delay <= Duration::from_secs(450));
    }

    #[test]
    fn default_matches_documented_policy() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay, Duration::from_secs(5));
        assert_eq!(config.max_delay, Duration::from_secs(300));
    }
}
