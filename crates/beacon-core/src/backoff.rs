//! Reconnect backoff
//!
//! Attempts are 1-based and count reconnect attempts only; the initial
//! connect is not an attempt.

use rand::Rng;
use std::time::Duration;

use crate::config::ReconnectOptions;

/// Exponential backoff with an upper bound and optional jitter
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    pub max_attempts: u32,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&ReconnectOptions::default())
    }
}

impl From<&ReconnectOptions> for BackoffPolicy {
    fn from(options: &ReconnectOptions) -> Self {
        Self {
            initial_delay: Duration::from_millis(options.initial_delay_ms),
            max_delay: Duration::from_millis(options.max_delay_ms),
            factor: options.factor,
            max_attempts: options.max_attempts,
            jitter: options.jitter,
        }
    }
}

impl BackoffPolicy {
    /// Delay before `attempt` without jitter
    ///
    /// `min(initial * factor^(attempt - 1), max)`, floored to whole ms.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let initial_ms = self.initial_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        let raw = initial_ms * self.factor.powi(exponent);
        let capped = if raw.is_finite() { raw.min(max_ms) } else { max_ms };
        Duration::from_millis(capped.floor() as u64)
    }

    /// Delay before `attempt`, with jitter when enabled
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::thread_rng())
    }

    /// Delay before `attempt`, drawing jitter from `rng`
    ///
    /// Jitter is uniform in `[0, 0.5 * base]` and added on top of the base.
    pub fn delay_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let spread = base.as_millis() as f64 * 0.5;
        let extra = rng.gen_range(0.0..=spread);
        base + Duration::from_millis(extra.floor() as u64)
    }

    /// Whether `attempt` is still within the retry budget
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}

/// Deterministic delay for `attempt` under `options`, ignoring jitter
pub fn calculate_backoff(attempt: u32, options: &ReconnectOptions) -> Duration {
    BackoffPolicy::from(options).base_delay(attempt)
}

/// Whether `attempt` may run under a budget of `max_attempts`
pub fn should_reconnect(attempt: u32, max_attempts: u32) -> bool {
    attempt <= max_attempts
}

/// Human-readable description of a scheduled attempt
pub fn format_reconnect_message(attempt: u32, delay: Duration) -> String {
    format!(
        "Reconnection attempt {} in {}ms",
        attempt,
        delay.as_millis()
    )
}
