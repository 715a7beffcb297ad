//! Delay curves backing the arithmetic schedules.
//!
//! A [`Backoff`] maps a 0-indexed continuation number to a delay. Schedules such as
//! [`Schedule::linear`](crate::Schedule::linear) and
//! [`Schedule::exponential`](crate::Schedule::exponential) are thin wrappers around
//! [`Schedule::backoff`](crate::Schedule::backoff), so the curve is an index into precomputed
//! parameters instead of a chain of stateful closures.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use ninelives_schedule::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(100))
//!     .with_max(Duration::from_secs(2))
//!     .unwrap();
//! assert_eq!(backoff.delay(0), Duration::from_millis(100));
//! assert_eq!(backoff.delay(1), Duration::from_millis(200));
//! assert_eq!(backoff.delay(6), Duration::from_secs(2)); // capped
//! ```
//!
//! Overflow behavior: delays are exact until they no longer fit in a `Duration`, then saturate to
//! [`MAX_BACKOFF`]. Only an explicit [`Backoff::with_max`] caps them earlier.

use std::time::Duration;

/// Delay reported when a curve overflows `Duration`.
pub const MAX_BACKOFF: Duration = Duration::MAX;

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackoffError {
    #[error("with_max is only valid for growing backoff curves")]
    ConstantDoesNotSupportMax,
    #[error("max must be greater than zero")]
    MaxMustBePositive,
    #[error("max ({max:?}) must be >= base ({base:?})")]
    MaxLessThanBase { base: Duration, max: Duration },
}

#[derive(Debug, Clone, PartialEq)]
enum Curve {
    Constant(Duration),
    Linear { base: Duration },
    Exponential { base: Duration, factor: f64 },
    Fibonacci { one: Duration },
}

impl Curve {
    fn base(&self) -> Duration {
        match self {
            Curve::Constant(d) => *d,
            Curve::Linear { base } | Curve::Exponential { base, .. } => *base,
            Curve::Fibonacci { one } => *one,
        }
    }

    fn delay(&self, step: usize) -> Duration {
        match self {
            Curve::Constant(d) => *d,
            Curve::Linear { base } => {
                let multiplier = (step as u128).saturating_add(1);
                base.as_nanos().checked_mul(multiplier).map_or(MAX_BACKOFF, from_nanos)
            }
            Curve::Exponential { base, factor } => {
                let exponent = step.min(i32::MAX as usize) as i32;
                scale(*base, factor.powi(exponent))
            }
            Curve::Fibonacci { one } => fibonacci(*one, step),
        }
    }
}

/// Nanoseconds to `Duration`, saturating to `MAX_BACKOFF` past `Duration::MAX`.
pub(crate) fn from_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    match u64::try_from(nanos / NANOS_PER_SEC) {
        Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
        Err(_) => MAX_BACKOFF,
    }
}

/// Multiply `base` by a float, saturating to `MAX_BACKOFF` and clamping non-positive results to zero.
pub(crate) fn scale(base: Duration, multiplier: f64) -> Duration {
    if base.is_zero() || multiplier.is_nan() || multiplier <= 0.0 {
        return Duration::ZERO;
    }
    let nanos = base.as_nanos() as f64 * multiplier;
    if !nanos.is_finite() || nanos >= MAX_BACKOFF.as_nanos() as f64 {
        return MAX_BACKOFF;
    }
    from_nanos(nanos.round() as u128)
}

// one × 1, 2, 3, 5, 8, ...
fn fibonacci(one: Duration, step: usize) -> Duration {
    if one.is_zero() {
        return Duration::ZERO;
    }
    let cap = MAX_BACKOFF.as_nanos();
    let unit = one.as_nanos();
    let (mut current, mut following) = (1u128, 2u128);
    for _ in 0..step {
        if unit.saturating_mul(current) >= cap {
            return MAX_BACKOFF;
        }
        let sum = current.saturating_add(following);
        current = following;
        following = sum;
    }
    from_nanos(unit.saturating_mul(current).min(cap))
}

/// Delay curve with an optional cap.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    curve: Curve,
    max: Option<Duration>,
}

impl Backoff {
    /// Same delay on every step.
    pub fn constant(delay: Duration) -> Self {
        Self { curve: Curve::Constant(delay), max: None }
    }

    /// `base × (step + 1)`.
    pub fn linear(base: Duration) -> Self {
        Self { curve: Curve::Linear { base }, max: None }
    }

    /// `base × 2^step`.
    pub fn exponential(base: Duration) -> Self {
        Self::exponential_by(base, 2.0)
    }

    /// `base × factor^step`. Non-finite or non-positive products saturate or clamp instead of
    /// panicking.
    pub fn exponential_by(base: Duration, factor: f64) -> Self {
        Self { curve: Curve::Exponential { base, factor }, max: None }
    }

    /// `one × fib(step)` over the sequence 1, 2, 3, 5, 8, ...
    pub fn fibonacci(one: Duration) -> Self {
        Self { curve: Curve::Fibonacci { one }, max: None }
    }

    /// Cap every computed delay at `max`.
    /// Returns an error for constant curves, a zero `max`, or `max < base`.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        if let Curve::Constant(_) = self.curve {
            return Err(BackoffError::ConstantDoesNotSupportMax);
        }
        let base = self.curve.base();
        if max < base {
            return Err(BackoffError::MaxLessThanBase { base, max });
        }
        self.max = Some(max);
        Ok(self)
    }

    /// Configured cap, if any.
    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// Delay for the given 0-indexed continuation.
    pub fn delay(&self, step: usize) -> Duration {
        let raw = self.curve.delay(step);
        self.max.map_or(raw, |m| raw.min(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_backoff_returns_same_delay() {
        let backoff = Backoff::constant(Duration::from_secs(1));
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(100), Duration::from_secs(1));
    }

    #[test]
    fn linear_backoff_increases_linearly() {
        let backoff = Backoff::linear(Duration::from_millis(100));
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(300));
        assert_eq!(backoff.delay(9), Duration::from_millis(1000));
    }

    #[test]
    fn exponential_backoff_doubles_each_time() {
        let backoff = Backoff::exponential(Duration::from_millis(100));
        assert_eq!(backoff.delay(0), Duration::from_millis(100)); // 100 * 2^0
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(1600));
    }

    #[test]
    fn exponential_backoff_honours_custom_factor() {
        let backoff = Backoff::exponential_by(Duration::from_millis(100), 3.0);
        assert_eq!(backoff.delay(2), Duration::from_millis(900));

        let shrinking = Backoff::exponential_by(Duration::from_millis(800), 0.5);
        assert_eq!(shrinking.delay(3), Duration::from_millis(100));
    }

    #[test]
    fn fibonacci_backoff_follows_sequence() {
        let backoff = Backoff::fibonacci(Duration::from_millis(10));
        let delays: Vec<_> = (0..6).map(|k| backoff.delay(k).as_millis()).collect();
        assert_eq!(delays, vec![10, 20, 30, 50, 80, 130]);
    }

    #[test]
    fn exponential_backoff_respects_max() {
        let backoff = Backoff::exponential(Duration::from_millis(100))
            .with_max(Duration::from_secs(1))
            .unwrap();
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1)); // Capped
        assert_eq!(backoff.delay(10), Duration::from_secs(1));
    }

    #[test]
    fn curves_saturate_instead_of_overflowing() {
        let huge_step: usize = 1_000_000_000;
        assert_eq!(Backoff::exponential(Duration::from_secs(1)).delay(huge_step), MAX_BACKOFF);
        assert_eq!(Backoff::linear(Duration::from_secs(u64::MAX / 2)).delay(huge_step), MAX_BACKOFF);
        assert_eq!(Backoff::fibonacci(Duration::from_secs(1)).delay(huge_step), MAX_BACKOFF);
    }

    #[test]
    fn degenerate_factors_do_not_panic() {
        let base = Duration::from_millis(10);
        assert_eq!(Backoff::exponential_by(base, f64::NAN).delay(1), Duration::ZERO);
        assert_eq!(Backoff::exponential_by(base, -2.0).delay(1), Duration::ZERO);
        assert_eq!(Backoff::exponential_by(base, f64::INFINITY).delay(1), MAX_BACKOFF);
        assert_eq!(Backoff::exponential_by(Duration::ZERO, f64::INFINITY).delay(1), Duration::ZERO);
    }

    #[test]
    fn with_max_on_constant_errors() {
        let constant = Backoff::constant(Duration::from_secs(5)).with_max(Duration::from_secs(10));
        assert!(matches!(constant, Err(BackoffError::ConstantDoesNotSupportMax)));
    }

    #[test]
    fn with_max_rejects_zero_and_small_caps() {
        let zero = Backoff::linear(Duration::from_secs(1)).with_max(Duration::ZERO);
        assert_eq!(zero.unwrap_err(), BackoffError::MaxMustBePositive);

        let err = Backoff::fibonacci(Duration::from_secs(100))
            .with_max(Duration::from_secs(50))
            .unwrap_err();
        assert!(matches!(err, BackoffError::MaxLessThanBase { .. }));
        assert!(err.to_string().contains("must be >= base"));
    }

    #[test]
    fn linear_with_cap_progression() {
        let backoff =
            Backoff::linear(Duration::from_secs(10)).with_max(Duration::from_secs(25)).unwrap();
        assert_eq!(backoff.max(), Some(Duration::from_secs(25)));
        assert_eq!(backoff.delay(0), Duration::from_secs(10));
        assert_eq!(backoff.delay(1), Duration::from_secs(20));
        assert_eq!(backoff.delay(2), Duration::from_secs(25)); // capped
    }

    #[test]
    fn delays_beyond_a_day_are_exact() {
        let hour = Duration::from_secs(3600);
        let day = Duration::from_secs(86_400);
        assert_eq!(Backoff::exponential(hour).delay(5), hour * 32);
        assert_eq!(Backoff::linear(day * 2).delay(0), day * 2);
        assert_eq!(Backoff::linear(day).delay(9), day * 10);
        assert_eq!(Backoff::fibonacci(day).delay(4), day * 8);
        assert_eq!(scale(day * 2, 1.0), day * 2);
        assert_eq!(scale(day * 365, 4.0), day * 1460);
    }

    #[test]
    fn from_nanos_covers_more_than_u64_nanos() {
        let past_u64 = u64::MAX as u128 + 1;
        assert_eq!(from_nanos(past_u64).as_nanos(), past_u64);
        assert_eq!(from_nanos(u128::MAX), MAX_BACKOFF);
    }
}
