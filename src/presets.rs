//! Ready-made schedules for common retry and polling shapes.
//!
//! ## Quick Start
//!
//! ```rust
//! use ninelives_schedule::{presets, Driver, InstantSleeper, ScheduleError};
//! use std::time::Duration;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let driver = Driver::builder().sleeper(InstantSleeper).build();
//! let policy = presets::exponential_retry::<std::io::Error>(Duration::from_millis(50), 3);
//!
//! let result: Result<(), ScheduleError<std::io::Error>> = driver
//!     .retry(&policy, || async {
//!         Err(std::io::Error::new(std::io::ErrorKind::Other, "down"))
//!     })
//!     .await;
//! assert_eq!(result.unwrap_err().attempts(), Some(4));
//! # });
//! ```
//!
//! ## Available Presets
//!
//! - [`exponential_retry`]: doubling backoff with full jitter
//! - [`capped_exponential_retry`]: doubling backoff that stops growing at a ceiling
//! - [`linear_retry`]: delay grows by `base` each retry
//! - [`fixed_retry`]: same delay every retry
//! - [`poll`]: wait `interval` between runs until cancelled
//!
//! Every retry preset outputs the number of retries scheduled so far, so the terminal output
//! handed to `retry_or_else` equals `max_retries`.

use crate::backoff::{Backoff, BackoffError};
use crate::jitter::Jitter;
use crate::schedule::Schedule;
use std::time::Duration;

/// Retries used by [`standard_retry`].
pub const DEFAULT_MAX_RETRIES: u64 = 3;
/// Initial delay used by [`standard_retry`].
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
/// Ceiling used by [`standard_retry`].
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Exponential backoff from `base` with full jitter, at most `max_retries` retries.
pub fn exponential_retry<I: 'static>(base: Duration, max_retries: u64) -> Schedule<I, u64> {
    Schedule::recurs(max_retries)
        .zip_left(&Schedule::exponential(base))
        .with_jitter(Jitter::full())
}

/// Exponential backoff from `base` capped at `max`, at most `max_retries` retries. No jitter.
pub fn capped_exponential_retry<I: 'static>(
    base: Duration,
    max: Duration,
    max_retries: u64,
) -> Result<Schedule<I, u64>, BackoffError> {
    let backoff = Backoff::exponential(base).with_max(max)?;
    Ok(Schedule::recurs(max_retries).zip_left(&Schedule::backoff(backoff)))
}

/// `base`, `2 × base`, `3 × base`, ... for at most `max_retries` retries.
pub fn linear_retry<I: 'static>(base: Duration, max_retries: u64) -> Schedule<I, u64> {
    Schedule::recurs(max_retries).zip_left(&Schedule::linear(base))
}

/// Wait `delay` before each of at most `max_retries` retries.
pub fn fixed_retry<I: 'static>(delay: Duration, max_retries: u64) -> Schedule<I, u64> {
    Schedule::recurs(max_retries).zip_left(&Schedule::spaced(delay))
}

/// Capped exponential retry with full jitter and the crate defaults.
pub fn standard_retry<I: 'static>() -> Schedule<I, u64> {
    // from_millis(100) < from_secs(10), so the cap is always accepted
    let backoff = Backoff::exponential(DEFAULT_BASE_DELAY)
        .with_max(DEFAULT_MAX_DELAY)
        .unwrap_or_else(|_| Backoff::exponential(DEFAULT_BASE_DELAY));
    Schedule::recurs(DEFAULT_MAX_RETRIES)
        .zip_left(&Schedule::backoff(backoff))
        .with_jitter(Jitter::full())
}

/// Poll forever, waiting `interval` after each run; outputs the run count.
/// Pair with `repeat` and a cancellation token to stop it.
pub fn poll<I: 'static>(interval: Duration) -> Schedule<I, u64> {
    Schedule::spaced(interval)
}
