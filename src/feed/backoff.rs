use std::future::Future;
use std::time::Duration;

/// Default number of fetch attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default exponential base; delay after attempt `n` is `base^n` seconds.
pub const DEFAULT_BACKOFF_BASE: u64 = 2;
/// Default per-attempt request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Default response body cap (10MB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Bounded retry policy for feed requests.
///
/// Every failed attempt is followed by a delay of `base^attempt` seconds
/// (attempt is 0-based), so the defaults produce 1s, 2s, 4s, 8s, 16s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: u64,
    pub per_attempt_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base: DEFAULT_BACKOFF_BASE,
            per_attempt_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (0-based).
    ///
    /// Saturates instead of overflowing for absurd attempt counts.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.base.saturating_pow(attempt))
    }
}

/// Suspends the current task between retry attempts.
///
/// Production code uses [`TokioSleeper`]; tests substitute an implementation
/// that records the requested delays and returns immediately.
pub trait Sleeper {
    fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + Send;
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(delay)
    }
}
