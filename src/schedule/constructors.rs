//! Primitive schedules.
//!
//! Everything here is infinite except [`Schedule::recurs`]; infinite schedules end only when
//! combined with a terminating one (`and`, `zip_left`, `do_while`, ...) or when the driver is
//! cancelled.

use super::Schedule;
use crate::backoff::Backoff;
use crate::decision::Decision;
use std::sync::Arc;
use std::time::Duration;

fn identity_step<I: Clone + 'static>(input: &I) -> Decision<I, I> {
    Decision::continue_with(input.clone(), Duration::ZERO, identity_step::<I>)
}

fn spaced_step<I: 'static>(count: u64, spacing: Duration) -> Decision<I, u64> {
    Decision::continue_with(count, spacing, move |_: &I| {
        spaced_step(count.saturating_add(1), spacing)
    })
}

fn recurs_step<I: 'static>(count: u64, limit: u64) -> Decision<I, u64> {
    if count < limit {
        Decision::continue_with(count, Duration::ZERO, move |_: &I| {
            recurs_step(count + 1, limit)
        })
    } else {
        Decision::Done(count)
    }
}

fn unfold_step<I, O, F>(state: O, advance: Arc<F>) -> Decision<I, O>
where
    I: 'static,
    O: Clone + Send + Sync + 'static,
    F: Fn(&O) -> O + Send + Sync + 'static,
{
    Decision::continue_with(state.clone(), Duration::ZERO, move |_: &I| {
        unfold_step(advance(&state), Arc::clone(&advance))
    })
}

fn backoff_step<I: 'static>(backoff: Arc<Backoff>, attempt: usize) -> Decision<I, Duration> {
    let delay = backoff.delay(attempt);
    Decision::continue_with(delay, delay, move |_: &I| {
        backoff_step(Arc::clone(&backoff), attempt.saturating_add(1))
    })
}

impl<I> Schedule<I, I>
where
    I: Clone + Send + Sync + 'static,
{
    /// Echo every input unchanged, forever, without waiting.
    pub fn identity() -> Self {
        Schedule::from_fn(identity_step::<I>)
    }

    /// Echo inputs while `predicate(input, output)` holds.
    pub fn recur_while<P>(predicate: P) -> Self
    where
        P: Fn(&I, &I) -> bool + Send + Sync + 'static,
    {
        Self::identity().do_while(predicate)
    }

    /// Echo inputs until `predicate(input, output)` holds.
    pub fn recur_until<P>(predicate: P) -> Self
    where
        P: Fn(&I, &I) -> bool + Send + Sync + 'static,
    {
        Self::identity().do_until(predicate)
    }
}

impl<I> Schedule<I, Vec<I>>
where
    I: Clone + Send + Sync + 'static,
{
    /// Collect every input seen so far into a `Vec`.
    pub fn collect_inputs() -> Self {
        Schedule::identity().collect()
    }
}

impl<I: 'static> Schedule<I, u64> {
    /// Count attempts (0, 1, 2, ...) and wait `spacing` between each.
    pub fn spaced(spacing: Duration) -> Self {
        Schedule::from_fn(move |_: &I| spaced_step(0, spacing))
    }

    /// Continue exactly `n` times (outputs `0..n`), then `Done(n)`.
    pub fn recurs(n: u64) -> Self {
        Schedule::from_fn(move |_: &I| recurs_step(0, n))
    }

    /// Count attempts forever without waiting.
    pub fn forever() -> Self {
        Schedule::unfold(0, |n: &u64| n.saturating_add(1))
    }
}

impl<I: 'static> Schedule<I, Duration> {
    /// Output and wait `backoff.delay(k)` on the k-th continuation (0-indexed).
    pub fn backoff(backoff: Backoff) -> Self {
        let backoff = Arc::new(backoff);
        Schedule::from_fn(move |_: &I| backoff_step(Arc::clone(&backoff), 0))
    }

    /// `base`, `2 × base`, `3 × base`, ...
    pub fn linear(base: Duration) -> Self {
        Self::backoff(Backoff::linear(base))
    }

    /// `base × 2^k`.
    pub fn exponential(base: Duration) -> Self {
        Self::backoff(Backoff::exponential(base))
    }

    /// `base × factor^k`.
    pub fn exponential_by(base: Duration, factor: f64) -> Self {
        Self::backoff(Backoff::exponential_by(base, factor))
    }

    /// `one`, `2 × one`, `3 × one`, `5 × one`, `8 × one`, ...
    pub fn fibonacci(one: Duration) -> Self {
        Self::backoff(Backoff::fibonacci(one))
    }
}

impl<I, O> Schedule<I, O>
where
    I: 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Output `initial`, then `advance(initial)`, `advance(advance(initial))`, ... without waiting.
    /// `advance` runs lazily, on the step that reports its result.
    pub fn unfold<F>(initial: O, advance: F) -> Self
    where
        F: Fn(&O) -> O + Send + Sync + 'static,
    {
        let advance = Arc::new(advance);
        Schedule::from_fn(move |_: &I| unfold_step(initial.clone(), Arc::clone(&advance)))
    }
}
