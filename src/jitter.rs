//! Jitter strategies to prevent synchronized retry storms
//!
//! When to use which strategy:
//! - `None`: deterministic delays for tests or tightly controlled workflows.
//! - `Full`: uniform in `[0, delay]`, good default to spread load.
//! - `Equal`: uniform in `[delay/2, delay]`, keeps a floor while adding randomness.
//! - `Range`: multiply the delay by a factor drawn uniformly from `[min, max)`; this is what
//!   [`Schedule::jittered`](crate::Schedule::jittered) uses.
//!
//! Notes:
//! - RNG: uses `rand`'s thread-local RNG by default; deterministic RNGs can be injected via
//!   `apply_with_rng` or [`Schedule::jittered_with`](crate::Schedule::jittered_with).
//! - Strategies are stateless, so one `Jitter` can be shared by any number of concurrent drivers.

use crate::backoff::{from_nanos, scale};
use rand::{rng, Rng};
use std::time::Duration;

/// Errors produced while configuring jitter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JitterError {
    #[error("jitter factors must be finite (got {min}..{max})")]
    NonFinite { min: f64, max: f64 },
    #[error("jitter factors must not be negative (got {min}..{max})")]
    Negative { min: f64, max: f64 },
    #[error("jitter min ({min}) must not exceed max ({max})")]
    Inverted { min: f64, max: f64 },
}

/// Validated multiplier range; fields are private to enforce validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterRange {
    min: f64,
    max: f64,
}

impl JitterRange {
    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

/// Jitter strategy for randomizing schedule delays
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Jitter {
    /// No jitter - use exact delay
    #[default]
    None,
    /// Full jitter: random between 0 and delay
    Full,
    /// Equal jitter: random between delay/2 and delay
    Equal,
    /// Scale the delay by a random factor in `[min, max)`
    Range(JitterRange),
}

impl Jitter {
    /// Create a full jitter strategy
    pub fn full() -> Self {
        Jitter::Full
    }

    /// Create an equal jitter strategy
    pub fn equal() -> Self {
        Jitter::Equal
    }

    /// Create a multiplicative jitter strategy over `[min, max)`.
    pub fn range(min: f64, max: f64) -> Result<Self, JitterError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(JitterError::NonFinite { min, max });
        }
        if min < 0.0 || max < 0.0 {
            return Err(JitterError::Negative { min, max });
        }
        if min > max {
            return Err(JitterError::Inverted { min, max });
        }
        Ok(Jitter::Range(JitterRange { min, max }))
    }

    /// Apply jitter to a delay duration
    pub fn apply(&self, delay: Duration) -> Duration {
        let mut rng = rng();
        self.apply_with_rng(delay, &mut rng)
    }

    /// Apply jitter with a custom RNG (for testing)
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        match self {
            Jitter::None => delay,
            Jitter::Full => {
                let nanos = delay.as_nanos();
                if nanos == 0 {
                    return Duration::ZERO;
                }
                from_nanos(rng.random_range(0..=nanos))
            }
            Jitter::Equal => {
                let nanos = delay.as_nanos();
                if nanos == 0 {
                    return Duration::ZERO;
                }
                from_nanos(rng.random_range(nanos / 2..=nanos))
            }
            Jitter::Range(range) => scale(delay, factor(range.min, range.max, rng)),
        }
    }
}

/// Uniform factor in `[min, max)`; an empty, inverted or unbounded range yields `min`.
pub(crate) fn factor<R: Rng>(min: f64, max: f64, rng: &mut R) -> f64 {
    if !min.is_finite() || !max.is_finite() || min >= max {
        return min;
    }
    rng.random_range(min..max)
}
