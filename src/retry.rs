//! Backoff policy and the timer used to wait between attempts.
//!
//! Every failed attempt is retried after `initial_delay * 2^n`, where `n` is the
//! 0-based retry counter, until `max_retries` retries have been spent. With the
//! defaults that is 5s, 10s, 20s, ... 2560s, for 11 attempts in total.

use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default delay before the first retry.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(5);

/// Default number of retries after the initial attempt.
pub const MAX_RETRIES: usize = 10;

/// Exponential backoff schedule.
///
/// # Examples
///
/// ```
/// use logship::Backoff;
/// use std::time::Duration;
///
/// let backoff = Backoff::default();
/// assert_eq!(backoff.delay_for_retry(0), Some(Duration::from_secs(5)));
/// assert_eq!(backoff.delay_for_retry(9), Some(Duration::from_secs(2560)));
/// assert_eq!(backoff.delay_for_retry(10), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// The delay before the first retry.
    pub initial_delay: Duration,
    /// The maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Whether to scale each delay by a random factor in `[0.5, 1.0]`.
    pub jitter: bool,
}

impl Backoff {
    /// Creates a schedule without jitter.
    pub fn new(initial_delay: Duration, max_retries: usize) -> Self {
        Self {
            initial_delay,
            max_retries,
            jitter: false,
        }
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the delay before retry `retry` (0-based), or `None` once the
    /// ceiling has been reached.
    pub fn delay_for_retry(&self, retry: usize) -> Option<Duration> {
        if retry >= self.max_retries {
            return None;
        }

        let multiplier = 2u32.saturating_pow(retry.try_into().unwrap_or(u32::MAX));
        let delay = self.initial_delay.saturating_mul(multiplier);

        if self.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
            let jittered = Duration::try_from_secs_f64(delay.as_secs_f64() * jitter_factor);
            Some(jittered.unwrap_or(delay))
        } else {
            Some(delay)
        }
    }

    /// Total number of attempts this schedule allows.
    pub fn max_attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(RETRY_BASE_DELAY, MAX_RETRIES)
    }
}

/// Suspends a delivery between attempts.
///
/// The default [`TokioTimer`] sleeps on the tokio clock. Supply your own to
/// observe or shorten backoff delays, e.g. in tests.
///
/// # Examples
///
/// ```
/// use logship::Timer;
/// use std::future::Future;
/// use std::pin::Pin;
/// use std::time::Duration;
///
/// /// Skips every backoff delay.
/// struct NoWait;
///
/// impl Timer for NoWait {
///     fn sleep(&self, _duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
///         Box::pin(async {})
///     }
/// }
/// ```
pub trait Timer: Send + Sync {
    /// Returns a future that completes after `duration`.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Timer backed by [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}
