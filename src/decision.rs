//! The result of a single schedule step.
//!
//! A [`Decision`] is either terminal ([`Decision::Done`]) or carries the value to report for this
//! step, how long the driver waits before the next one, and the continuation to call with the
//! following input ([`Decision::Continue`]).
//!
//! Invariants:
//! - `delay` is a `Duration` and therefore never negative; `Duration::ZERO` means "proceed
//!   immediately" and drivers skip the sleeper entirely.
//! - A continuation only reads state it captured when it was built, so calling it twice with the
//!   same input yields the same decision (modulo intentionally effectful steps such as jitter).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Step function: consumes a borrowed input and decides what happens next.
pub type Next<I, O> = Arc<dyn Fn(&I) -> Decision<I, O> + Send + Sync>;

/// Outcome of one schedule step.
pub enum Decision<I, O> {
    /// Terminal; the schedule will not be stepped again.
    Done(O),
    /// Non-terminal; wait `delay`, then feed the next input to `next`.
    Continue {
        output: O,
        delay: Duration,
        next: Next<I, O>,
    },
}

impl<I, O> Decision<I, O> {
    /// Build a `Continue` from a plain closure.
    pub fn continue_with<F>(output: O, delay: Duration, next: F) -> Self
    where
        F: Fn(&I) -> Decision<I, O> + Send + Sync + 'static,
    {
        Decision::Continue { output, delay, next: Arc::new(next) }
    }

    /// Value reported by this step, terminal or not.
    pub fn output(&self) -> &O {
        match self {
            Decision::Done(output) => output,
            Decision::Continue { output, .. } => output,
        }
    }

    pub fn into_output(self) -> O {
        match self {
            Decision::Done(output) => output,
            Decision::Continue { output, .. } => output,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Decision::Done(_))
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, Decision::Continue { .. })
    }

    /// Requested wait before the next step; `None` for `Done`.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Decision::Done(_) => None,
            Decision::Continue { delay, .. } => Some(*delay),
        }
    }
}

impl<I, O: fmt::Debug> fmt::Debug for Decision<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Done(output) => f.debug_tuple("Done").field(output).finish(),
            Decision::Continue { output, delay, .. } => f
                .debug_struct("Continue")
                .field("output", output)
                .field("delay", delay)
                .field("next", &"<step>")
                .finish(),
        }
    }
}
