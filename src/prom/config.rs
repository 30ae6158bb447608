/**
 * Configuration constants for the metrics query engine
 */
use std::time::Duration;

/// Attempts made by the retrying transport before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Per-attempt timeout in milliseconds; exceeding it counts as a transient failure
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 15_000;

/// Base delay in milliseconds for exponential backoff between attempts
pub const DEFAULT_BASE_DELAY_MS: u64 = 600;

/// Bounds of the uniform jitter multiplier applied to every backoff delay
pub const JITTER_MIN: f64 = 0.4;
pub const JITTER_MAX: f64 = 1.4;

/// Largest backoff exponent, keeps `2^(attempt-1)` finite for huge attempt budgets
pub const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Default range query window in seconds (one hour back from now)
pub const DEFAULT_RANGE_SECS: i64 = 3600;

/// Default range query step; with the one hour window this yields the
/// points at 0, 15, 30, 45 and 60 minutes
pub const DEFAULT_STEP: &str = "15m0s";

/// How far back the comparison sample of a board is taken (one week)
pub const COMPARISON_OFFSET_SECS: i64 = 604_800;

/// Default TTL of memoized query results
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Most memoized results kept at once; the oldest is evicted past this
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 256;

/// Backoff and timeout settings for the retrying transport
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub base_delay: Duration,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: Duration::from_millis(DEFAULT_ATTEMPT_TIMEOUT_MS),
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            jitter_min: JITTER_MIN,
            jitter_max: JITTER_MAX,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub const fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    #[must_use]
    pub const fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before the attempt following `attempt` (1-based), for a given jitter
    ///
    /// `base_delay * 2^(attempt-1) * jitter`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    pub fn backoff(&self, attempt: u32, jitter: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let factor = f64::from(1u32 << exponent) * jitter.max(0.0);
        let nanos = self.base_delay.as_nanos() as f64 * factor;
        Duration::from_nanos(nanos.round() as u64)
    }

    /// Draw a jitter multiplier uniformly from `[jitter_min, jitter_max]`
    #[must_use]
    pub fn draw_jitter(&self) -> f64 {
        (self.jitter_max - self.jitter_min).mul_add(fastrand::f64(), self.jitter_min)
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(DEFAULT_MAX_ATTEMPTS > 0, "DEFAULT_MAX_ATTEMPTS must be greater than 0");
    assert!(DEFAULT_ATTEMPT_TIMEOUT_MS > 0, "DEFAULT_ATTEMPT_TIMEOUT_MS must be greater than 0");
    assert!(DEFAULT_BASE_DELAY_MS > 0, "DEFAULT_BASE_DELAY_MS must be greater than 0");
    assert!(DEFAULT_RANGE_SECS > 0, "DEFAULT_RANGE_SECS must be greater than 0");
    assert!(COMPARISON_OFFSET_SECS > 0, "COMPARISON_OFFSET_SECS must be greater than 0");
    assert!(DEFAULT_CACHE_MAX_ENTRIES > 0, "DEFAULT_CACHE_MAX_ENTRIES must be greater than 0");
    assert!(MAX_BACKOFF_EXPONENT < 32, "MAX_BACKOFF_EXPONENT must fit a u32 shift");
};
