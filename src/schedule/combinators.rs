//! Combinator algebra over [`Schedule`].
//!
//! Every combinator is total: it only rearranges step functions and never catches anything the
//! user closures do. A panic inside a transform or predicate unwinds out of the step call.
//!
//! Binary combinators (`and`, `or` and their projections) step the receiver before the argument,
//! always with the same input. When both terminate on the same step, the receiver's `Done` is
//! authoritative and the argument's output is still folded into the final value; its
//! continuation is dropped and never entered.

use super::Schedule;
use crate::backoff::scale;
use crate::decision::{Decision, Next};
use crate::either::Either;
use crate::jitter::{factor, Jitter};
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn map_step<I, O, B, F>(input: &I, step: &Next<I, O>, f: &Arc<F>) -> Decision<I, B>
where
    I: 'static,
    O: 'static,
    B: 'static,
    F: Fn(O) -> B + Send + Sync + 'static,
{
    match step(input) {
        Decision::Done(output) => Decision::Done(f(output)),
        Decision::Continue { output, delay, next } => {
            let f = Arc::clone(f);
            Decision::Continue {
                output: f(output),
                delay,
                next: Arc::new(move |input: &I| map_step(input, &next, &f)),
            }
        }
    }
}

fn and_then_left<I, O, A, C, L, R>(
    input: &I,
    step: &Next<I, O>,
    other: &Next<I, A>,
    if_left: &Arc<L>,
    if_right: &Arc<R>,
) -> Decision<I, C>
where
    I: Clone + Send + Sync + 'static,
    O: 'static,
    A: 'static,
    C: 'static,
    L: Fn(O) -> C + Send + Sync + 'static,
    R: Fn(A) -> C + Send + Sync + 'static,
{
    match step(input) {
        Decision::Continue { output, delay, next } => {
            let (other, if_left, if_right) = (Arc::clone(other), Arc::clone(if_left), Arc::clone(if_right));
            Decision::Continue {
                output: if_left(output),
                delay,
                next: Arc::new(move |input: &I| {
                    and_then_left(input, &next, &other, &if_left, &if_right)
                }),
            }
        }
        Decision::Done(output) => {
            // The second schedule starts with the input that finished the first one.
            let completing = input.clone();
            let (other, if_right) = (Arc::clone(other), Arc::clone(if_right));
            Decision::Continue {
                output: if_left(output),
                delay: Duration::ZERO,
                next: Arc::new(move |_: &I| and_then_right(&completing, &other, &if_right)),
            }
        }
    }
}

fn and_then_right<I, A, C, R>(input: &I, step: &Next<I, A>, if_right: &Arc<R>) -> Decision<I, C>
where
    I: 'static,
    A: 'static,
    C: 'static,
    R: Fn(A) -> C + Send + Sync + 'static,
{
    match step(input) {
        Decision::Done(output) => Decision::Done(if_right(output)),
        Decision::Continue { output, delay, next } => {
            let if_right = Arc::clone(if_right);
            Decision::Continue {
                output: if_right(output),
                delay,
                next: Arc::new(move |input: &I| and_then_right(input, &next, &if_right)),
            }
        }
    }
}

fn pipe_step<I, O, B>(input: &I, left: &Next<I, O>, right: &Next<O, B>) -> Decision<I, B>
where
    I: 'static,
    O: 'static,
    B: 'static,
{
    match left(input) {
        Decision::Done(output) => Decision::Done(right(&output).into_output()),
        Decision::Continue { output, delay, next } => match right(&output) {
            Decision::Done(piped) => Decision::Done(piped),
            Decision::Continue { output: piped, delay: piped_delay, next: piped_next } => {
                Decision::Continue {
                    output: piped,
                    delay: delay.saturating_add(piped_delay),
                    next: Arc::new(move |input: &I| pipe_step(input, &next, &piped_next)),
                }
            }
        },
    }
}

fn while_step<I, O, P>(input: &I, step: &Next<I, O>, predicate: &Arc<P>) -> Decision<I, O>
where
    I: 'static,
    O: 'static,
    P: Fn(&I, &O) -> bool + Send + Sync + 'static,
{
    match step(input) {
        Decision::Continue { output, delay, next } => {
            if predicate(input, &output) {
                let predicate = Arc::clone(predicate);
                Decision::Continue {
                    output,
                    delay,
                    next: Arc::new(move |input: &I| while_step(input, &next, &predicate)),
                }
            } else {
                Decision::Done(output)
            }
        }
        done @ Decision::Done(_) => done,
    }
}

fn delayed_step<I, O, F>(input: &I, step: &Next<I, O>, transform: &Arc<F>) -> Decision<I, O>
where
    I: 'static,
    O: 'static,
    F: Fn(&O, Duration) -> Duration + Send + Sync + 'static,
{
    match step(input) {
        Decision::Continue { output, delay, next } => {
            let transform = Arc::clone(transform);
            Decision::Continue {
                delay: transform(&output, delay),
                output,
                next: Arc::new(move |input: &I| delayed_step(input, &next, &transform)),
            }
        }
        done @ Decision::Done(_) => done,
    }
}

fn map_decision_step<I, O, F>(input: &I, step: &Next<I, O>, f: &Arc<F>) -> Decision<I, O>
where
    I: 'static,
    O: 'static,
    F: Fn(Decision<I, O>) -> Decision<I, O> + Send + Sync + 'static,
{
    let decision = match step(input) {
        Decision::Continue { output, delay, next } => {
            let f = Arc::clone(f);
            Decision::Continue {
                output,
                delay,
                next: Arc::new(move |input: &I| map_decision_step(input, &next, &f)),
            }
        }
        done @ Decision::Done(_) => done,
    };
    f(decision)
}

fn fold_step<I, O, B, F>(input: &I, acc: &B, step: &Next<I, O>, f: &Arc<F>) -> Decision<I, B>
where
    I: 'static,
    O: 'static,
    B: Clone + Send + Sync + 'static,
    F: Fn(B, O) -> B + Send + Sync + 'static,
{
    match step(input) {
        Decision::Continue { output, delay, next } => {
            let folded = f(acc.clone(), output);
            let carried = folded.clone();
            let f = Arc::clone(f);
            Decision::Continue {
                output: folded,
                delay,
                next: Arc::new(move |input: &I| fold_step(input, &carried, &next, &f)),
            }
        }
        // The terminal output is not folded in.
        Decision::Done(_) => Decision::Done(acc.clone()),
    }
}

fn and_step<I, O, B, C, X, D>(
    input: &I,
    left: &Next<I, O>,
    right: &Next<I, B>,
    combine: &Arc<X>,
    combine_delay: &Arc<D>,
) -> Decision<I, C>
where
    I: 'static,
    O: 'static,
    B: 'static,
    C: 'static,
    X: Fn(O, B) -> C + Send + Sync + 'static,
    D: Fn(Duration, Duration) -> Duration + Send + Sync + 'static,
{
    let ours = left(input);
    let theirs = right(input);
    match (ours, theirs) {
        (
            Decision::Continue { output: a, delay: a_delay, next: a_next },
            Decision::Continue { output: b, delay: b_delay, next: b_next },
        ) => {
            let (combine, combine_delay) = (Arc::clone(combine), Arc::clone(combine_delay));
            Decision::Continue {
                output: combine(a, b),
                delay: combine_delay(a_delay, b_delay),
                next: Arc::new(move |input: &I| {
                    and_step(input, &a_next, &b_next, &combine, &combine_delay)
                }),
            }
        }
        (ours, theirs) => Decision::Done(combine(ours.into_output(), theirs.into_output())),
    }
}

type Branch<I, O> = (Option<O>, Option<Duration>, Option<Next<I, O>>);

fn branch<I, O>(decision: Option<Decision<I, O>>) -> Branch<I, O> {
    match decision {
        None => (None, None, None),
        Some(Decision::Done(output)) => (Some(output), None, None),
        Some(Decision::Continue { output, delay, next }) => (Some(output), Some(delay), Some(next)),
    }
}

fn or_step<I, O, B, C, X, D>(
    input: &I,
    left: Option<&Next<I, O>>,
    right: Option<&Next<I, B>>,
    combine: &Arc<X>,
    combine_delay: &Arc<D>,
) -> Decision<I, C>
where
    I: 'static,
    O: 'static,
    B: 'static,
    C: 'static,
    X: Fn(Option<O>, Option<B>) -> C + Send + Sync + 'static,
    D: Fn(Option<Duration>, Option<Duration>) -> Duration + Send + Sync + 'static,
{
    let (a, a_delay, a_next) = branch(left.map(|step| step(input)));
    let (b, b_delay, b_next) = branch(right.map(|step| step(input)));
    if a_next.is_none() && b_next.is_none() {
        return Decision::Done(combine(a, b));
    }
    let (combine, combine_delay) = (Arc::clone(combine), Arc::clone(combine_delay));
    Decision::Continue {
        output: combine(a, b),
        delay: combine_delay(a_delay, b_delay),
        next: Arc::new(move |input: &I| {
            or_step(input, a_next.as_ref(), b_next.as_ref(), &combine, &combine_delay)
        }),
    }
}

fn longest(a: Duration, b: Duration) -> Duration {
    a.max(b)
}

fn shortest(a: Option<Duration>, b: Option<Duration>) -> Duration {
    match (a, b) {
        (Some(a), Some(b)) => a.min(b),
        (Some(d), None) | (None, Some(d)) => d,
        (None, None) => Duration::ZERO,
    }
}

impl<I, O> Schedule<I, O>
where
    I: 'static,
    O: Send + Sync + 'static,
{
    /// Transform every output, keeping the `Done`/`Continue` shape and the delay.
    pub fn map<B, F>(&self, f: F) -> Schedule<I, B>
    where
        B: 'static,
        F: Fn(O) -> B + Send + Sync + 'static,
    {
        let (step, f) = (self.next(), Arc::new(f));
        Schedule::from_fn(move |input: &I| map_step(input, &step, &f))
    }

    /// Run `self` to completion, then `other` to completion; outputs are tagged `Left`/`Right`.
    ///
    /// `self` reaching `Done` yields one extra `Continue` (with zero delay) carrying its final
    /// output. The step after that enters `other` with the input that finished `self`, ignoring
    /// the input it is given; later steps of `other` see fresh inputs.
    pub fn and_then<A>(&self, other: &Schedule<I, A>) -> Schedule<I, Either<O, A>>
    where
        I: Clone + Send + Sync,
        A: Send + Sync + 'static,
    {
        self.and_then_with(other, Either::Left, Either::Right)
    }

    /// [`and_then`](Self::and_then) with custom projections of both sides into one output type.
    pub fn and_then_with<A, C, L, R>(
        &self,
        other: &Schedule<I, A>,
        if_left: L,
        if_right: R,
    ) -> Schedule<I, C>
    where
        I: Clone + Send + Sync,
        A: 'static,
        C: 'static,
        L: Fn(O) -> C + Send + Sync + 'static,
        R: Fn(A) -> C + Send + Sync + 'static,
    {
        let (step, other) = (self.next(), other.next());
        let (if_left, if_right) = (Arc::new(if_left), Arc::new(if_right));
        Schedule::from_fn(move |input: &I| and_then_left(input, &step, &other, &if_left, &if_right))
    }

    /// Feed each output of `self` to `other` as its input. Delays add up; the result is `Done`
    /// as soon as either side is.
    pub fn pipe<B>(&self, other: &Schedule<O, B>) -> Schedule<I, B>
    where
        B: 'static,
    {
        let (left, right) = (self.next(), other.next());
        Schedule::from_fn(move |input: &I| pipe_step(input, &left, &right))
    }

    /// Continue as `self` does while `predicate(input, output)` holds; the first rejected step
    /// becomes `Done` with its output.
    pub fn do_while<P>(&self, predicate: P) -> Schedule<I, O>
    where
        P: Fn(&I, &O) -> bool + Send + Sync + 'static,
    {
        let (step, predicate) = (self.next(), Arc::new(predicate));
        Schedule::from_fn(move |input: &I| while_step(input, &step, &predicate))
    }

    /// Continue until `predicate(input, output)` holds.
    pub fn do_until<P>(&self, predicate: P) -> Schedule<I, O>
    where
        P: Fn(&I, &O) -> bool + Send + Sync + 'static,
    {
        self.do_while(move |input, output| !predicate(input, output))
    }

    /// Observe every non-terminal step without changing it.
    pub fn log<F>(&self, action: F) -> Schedule<I, O>
    where
        F: Fn(&I, &O) + Send + Sync + 'static,
    {
        self.do_while(move |input, output| {
            action(input, output);
            true
        })
    }

    /// Replace each `Continue` delay with `transform(output, delay)`.
    pub fn delayed<F>(&self, transform: F) -> Schedule<I, O>
    where
        F: Fn(&O, Duration) -> Duration + Send + Sync + 'static,
    {
        let (step, transform) = (self.next(), Arc::new(transform));
        Schedule::from_fn(move |input: &I| delayed_step(input, &step, &transform))
    }

    /// Multiply every delay by a factor drawn from `[min, max)` using the thread-local RNG.
    ///
    /// An empty or inverted range uses `min`; negative factors clamp the delay to zero.
    pub fn jittered(&self, min: f64, max: f64) -> Schedule<I, O> {
        self.delayed(move |_, delay| scale(delay, factor(min, max, &mut rand::rng())))
    }

    /// [`jittered`](Self::jittered) with an injected random source, drawn once per step.
    pub fn jittered_with<R>(&self, min: f64, max: f64, rng: R) -> Schedule<I, O>
    where
        R: Rng + Send + 'static,
    {
        let rng = Mutex::new(rng);
        self.delayed(move |_, delay| {
            let mut rng = rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            scale(delay, factor(min, max, &mut *rng))
        })
    }

    /// Randomize every delay with one of the [`Jitter`] strategies.
    pub fn with_jitter(&self, jitter: Jitter) -> Schedule<I, O> {
        self.delayed(move |_, delay| jitter.apply(delay))
    }

    /// Post-process every decision before it is returned.
    ///
    /// `f` sees each step's decision, terminal or not; a `Continue` it receives already routes its
    /// continuation back through `f`.
    pub fn map_decision<F>(&self, f: F) -> Schedule<I, O>
    where
        F: Fn(Decision<I, O>) -> Decision<I, O> + Send + Sync + 'static,
    {
        let (step, f) = (self.next(), Arc::new(f));
        Schedule::from_fn(move |input: &I| map_decision_step(input, &step, &f))
    }

    /// Fold every non-terminal output into an accumulator starting at `seed`.
    ///
    /// On `Done` the schedule reports the accumulator as it stood before that step; the terminal
    /// output itself is never folded in.
    pub fn fold<B, F>(&self, seed: B, f: F) -> Schedule<I, B>
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(B, O) -> B + Send + Sync + 'static,
    {
        let (step, f) = (self.next(), Arc::new(f));
        Schedule::from_fn(move |input: &I| fold_step(input, &seed, &step, &f))
    }

    /// Collect every non-terminal output, in order.
    pub fn collect(&self) -> Schedule<I, Vec<O>>
    where
        O: Clone,
    {
        self.fold(Vec::new(), |mut acc, output| {
            acc.push(output);
            acc
        })
    }

    /// Run both schedules on the same input; `Done` as soon as either is. Outputs are paired and
    /// the longer delay wins.
    pub fn and<B>(&self, other: &Schedule<I, B>) -> Schedule<I, (O, B)>
    where
        B: Send + Sync + 'static,
    {
        self.and_with(other, |a, b| (a, b))
    }

    /// [`and`](Self::and) with a custom output combiner.
    pub fn and_with<B, C, X>(&self, other: &Schedule<I, B>, combine: X) -> Schedule<I, C>
    where
        B: 'static,
        C: 'static,
        X: Fn(O, B) -> C + Send + Sync + 'static,
    {
        self.and_with_delay(other, combine, longest)
    }

    /// [`and`](Self::and) with custom output and delay combiners.
    pub fn and_with_delay<B, C, X, D>(
        &self,
        other: &Schedule<I, B>,
        combine: X,
        combine_delay: D,
    ) -> Schedule<I, C>
    where
        B: 'static,
        C: 'static,
        X: Fn(O, B) -> C + Send + Sync + 'static,
        D: Fn(Duration, Duration) -> Duration + Send + Sync + 'static,
    {
        let (left, right) = (self.next(), other.next());
        let (combine, combine_delay) = (Arc::new(combine), Arc::new(combine_delay));
        Schedule::from_fn(move |input: &I| and_step(input, &left, &right, &combine, &combine_delay))
    }

    /// Run both schedules on the same input until both are `Done`. A side that already finished
    /// contributes `None` from then on. The shorter present delay wins.
    pub fn or<B>(&self, other: &Schedule<I, B>) -> Schedule<I, (Option<O>, Option<B>)>
    where
        B: Send + Sync + 'static,
    {
        self.or_with(other, |a, b| (a, b))
    }

    /// [`or`](Self::or) with a custom output combiner.
    pub fn or_with<B, C, X>(&self, other: &Schedule<I, B>, combine: X) -> Schedule<I, C>
    where
        B: 'static,
        C: 'static,
        X: Fn(Option<O>, Option<B>) -> C + Send + Sync + 'static,
    {
        self.or_with_delay(other, combine, shortest)
    }

    /// [`or`](Self::or) with custom output and delay combiners. The delay combiner sees `None`
    /// for a side that is done or already finished.
    pub fn or_with_delay<B, C, X, D>(
        &self,
        other: &Schedule<I, B>,
        combine: X,
        combine_delay: D,
    ) -> Schedule<I, C>
    where
        B: 'static,
        C: 'static,
        X: Fn(Option<O>, Option<B>) -> C + Send + Sync + 'static,
        D: Fn(Option<Duration>, Option<Duration>) -> Duration + Send + Sync + 'static,
    {
        let (left, right) = (self.next(), other.next());
        let (combine, combine_delay) = (Arc::new(combine), Arc::new(combine_delay));
        Schedule::from_fn(move |input: &I| {
            or_step(input, Some(&left), Some(&right), &combine, &combine_delay)
        })
    }

    /// [`and`](Self::and), keeping only this schedule's output.
    pub fn zip_left<B>(&self, other: &Schedule<I, B>) -> Schedule<I, O>
    where
        B: 'static,
    {
        self.and_with(other, |a, _| a)
    }

    /// [`and`](Self::and), keeping only the other schedule's output.
    pub fn zip_right<B>(&self, other: &Schedule<I, B>) -> Schedule<I, B>
    where
        B: 'static,
    {
        self.and_with(other, |_, b| b)
    }
}
