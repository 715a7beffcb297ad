//! Schedule handle.
//!
//! A [`Schedule`] wraps one step function. Constructors live in [`constructors`], the combinator
//! algebra in [`combinators`], and the drivers that actually wait and invoke user code in
//! [`crate::driver`].
//!
//! Semantics:
//! - A schedule never mutates. Every combinator returns a new schedule whose step function closes
//!   over the operands' step functions.
//! - Running a schedule unfolds a fresh chain of continuations; the state of a run is the current
//!   [`Next`] held by the driver. Dropping it releases everything the run captured.
//! - Cloning is cheap (one `Arc`), and any number of drivers may run clones concurrently.
//!
//! Example
//! ```rust
//! use ninelives_schedule::{Decision, Schedule};
//! use std::time::Duration;
//!
//! let schedule = Schedule::<(), u64>::spaced(Duration::from_millis(10))
//!     .zip_left(&Schedule::recurs(1));
//!
//! let first = schedule.step(&());
//! assert_eq!(first.delay(), Some(Duration::from_millis(10)));
//! let Decision::Continue { next, .. } = first else { unreachable!() };
//! assert!(next(&()).is_done());
//! ```

pub mod combinators;
pub mod constructors;

use crate::decision::{Decision, Next};
use std::fmt;
use std::sync::Arc;

/// Immutable retry/repeat policy: `Input -> Decision<Input, Output>`.
pub struct Schedule<I, O> {
    step: Next<I, O>,
}

impl<I, O> Clone for Schedule<I, O> {
    fn clone(&self) -> Self {
        Self { step: Arc::clone(&self.step) }
    }
}

impl<I, O> fmt::Debug for Schedule<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schedule").field("step", &"<step>").finish()
    }
}

impl<I, O> Schedule<I, O> {
    /// Wrap an existing step function.
    pub fn new(step: Next<I, O>) -> Self {
        Self { step }
    }

    /// Build a schedule from a closure.
    pub fn from_fn<F>(step: F) -> Self
    where
        F: Fn(&I) -> Decision<I, O> + Send + Sync + 'static,
    {
        Self { step: Arc::new(step) }
    }

    /// Evaluate the first step of the schedule for `input`.
    pub fn step(&self, input: &I) -> Decision<I, O> {
        (self.step)(input)
    }

    /// The initial step function; drivers start their cursor here.
    pub fn next(&self) -> Next<I, O> {
        Arc::clone(&self.step)
    }
}
