//! Admission and retry policies.

use std::time::Duration;

use rag_types::SchedulerSettings;

/// Admission limits for a batch: how many units run at once, and how
/// close together two unit starts may be.
#[derive(Debug, Clone)]
pub struct RateLimits {
    /// Maximum concurrently in-flight units
    pub max_concurrent: usize,
    /// Minimum spacing between successive unit starts
    pub min_spacing: Duration,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            min_spacing: Duration::from_millis(200),
        }
    }
}

impl RateLimits {
    pub fn new(max_concurrent: usize, min_spacing: Duration) -> Self {
        Self {
            max_concurrent,
            min_spacing,
        }
    }
}

/// Per-unit retry policy: exponential backoff capped by attempt count.
///
/// Delay before retry n (counting failed attempts from 1) is
/// `base_delay * factor^(n-1)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts per unit, first try included
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Multiplier applied per further failed attempt
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            factor,
        }
    }

    /// Backoff delay after the given failed attempt (1-based).
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1);
        self.base_delay.mul_f64(self.factor.powi(exponent as i32))
    }
}

/// Split the shared settings into the two scheduler policies.
pub fn from_settings(settings: &SchedulerSettings) -> (RateLimits, RetryPolicy) {
    (
        RateLimits::new(
            settings.max_concurrent,
            Duration::from_millis(settings.min_spacing_ms),
        ),
        RetryPolicy::new(
            settings.max_attempts,
            Duration::from_millis(settings.base_delay_ms),
            settings.backoff_factor,
        ),
    )
}
