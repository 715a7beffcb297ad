//! Drivers that run user code under a [`Schedule`].
//!
//! Two protocols:
//! - **repeat**: run `block`, feed its `Ok` value to the schedule, wait, and go again until the
//!   schedule is `Done`; that final output is the result. An `Err` from `block` goes to the
//!   fallback together with the last non-terminal output (if any).
//! - **retry**: run `action`; `Ok` returns immediately without consulting the schedule. An `Err`
//!   is fed to the schedule; `Continue` waits and tries again, `Done` hands the last error and the
//!   schedule's terminal output to the fallback.
//!
//! Semantics shared by both:
//! - Cancellation is checked before every attempt, raced against the attempt itself and against
//!   every wait. It surfaces as [`ScheduleError::Cancelled`]; neither the action nor the fallback
//!   runs afterwards.
//! - Errors classified fatal surface as [`ScheduleError::Fatal`] without touching the schedule or
//!   the fallback.
//! - A zero delay never reaches the sleeper.
//! - Each run keeps its own step cursor, so one schedule can back any number of concurrent runs.
//!
//! Example
//! ```rust
//! use ninelives_schedule::{Driver, InstantSleeper, Schedule, ScheduleError};
//! use std::time::Duration;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let driver = Driver::builder().sleeper(InstantSleeper).build();
//! let schedule = Schedule::<std::io::Error, Duration>::exponential(Duration::from_millis(10))
//!     .zip_left(&Schedule::recurs(2));
//!
//! let mut calls = 0;
//! let result: Result<u32, ScheduleError<std::io::Error>> = driver
//!     .retry(&schedule, || {
//!         calls += 1;
//!         let attempt = calls;
//!         async move {
//!             if attempt < 3 { Err(std::io::Error::new(std::io::ErrorKind::Other, "flaky")) } else { Ok(attempt) }
//!         }
//!     })
//!     .await;
//! assert_eq!(result.unwrap(), 3);
//! # });
//! ```

use crate::classify::{Classifier, NonFatal};
use crate::decision::Decision;
use crate::either::Either;
use crate::error::{Cancelled, ScheduleError};
use crate::schedule::Schedule;
use crate::sleeper::{Sleeper, TokioSleeper};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Wait primitive, cancellation token and error classifier shared by every run.
#[derive(Clone)]
pub struct Driver<C = NonFatal> {
    sleeper: Arc<dyn Sleeper>,
    cancellation: CancellationToken,
    classifier: C,
}

impl<C> fmt::Debug for Driver<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("sleeper", &self.sleeper)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("classifier", &"<classifier>")
            .finish()
    }
}

impl Default for Driver<NonFatal> {
    fn default() -> Self {
        DriverBuilder::new().build()
    }
}

impl Driver<NonFatal> {
    /// Construct a new builder with defaults.
    pub fn builder() -> DriverBuilder<NonFatal> {
        DriverBuilder::new()
    }
}

enum RetryOutcome<T, E, O> {
    Succeeded(T),
    Exhausted { error: E, output: O, attempts: usize },
}

impl<C> Driver<C> {
    /// Token observed by this driver; cancelling it aborts every run in progress.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Fail fast if the surrounding execution has been cancelled.
    pub fn ensure_active(&self) -> Result<(), Cancelled> {
        if self.cancellation.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    async fn attempt<T, E, Fut>(&self, work: Fut) -> Result<Result<T, E>, Cancelled>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Cancelled),
            result = work => Ok(result),
        }
    }

    async fn wait(&self, delay: Duration) -> Result<(), Cancelled> {
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Cancelled),
            _ = self.sleeper.sleep(delay) => Ok(()),
        }
    }

    /// Repeat `block` until the schedule is `Done`, returning its final output.
    /// A recoverable error from `block` is re-raised as [`ScheduleError::Inner`].
    pub async fn repeat<I, O, E, F, Fut>(
        &self,
        schedule: &Schedule<I, O>,
        block: F,
    ) -> Result<O, ScheduleError<E>>
    where
        C: Classifier<E>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<I, E>>,
    {
        match self.repeat_or_else_either(schedule, block, |error, _| error).await? {
            Either::Left(error) => Err(ScheduleError::Inner(error)),
            Either::Right(output) => Ok(output),
        }
    }

    /// Repeat `block`; a recoverable error is replaced by `or_else(error, last_output)`.
    pub async fn repeat_or_else<I, O, E, F, Fut, H>(
        &self,
        schedule: &Schedule<I, O>,
        block: F,
        or_else: H,
    ) -> Result<O, ScheduleError<E>>
    where
        C: Classifier<E>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<I, E>>,
        H: FnOnce(E, Option<O>) -> O,
    {
        self.repeat_or_else_either(schedule, block, or_else).await.map(Either::merge)
    }

    /// Repeat `block`; the schedule's final output comes back on the `Right`, the fallback for a
    /// recoverable error on the `Left`.
    ///
    /// The fallback receives the output of the last `Continue` that completed its wait, or `None`
    /// when the first attempt failed.
    pub async fn repeat_or_else_either<I, O, E, A, F, Fut, H>(
        &self,
        schedule: &Schedule<I, O>,
        mut block: F,
        or_else: H,
    ) -> Result<Either<A, O>, ScheduleError<E>>
    where
        C: Classifier<E>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<I, E>>,
        H: FnOnce(E, Option<O>) -> A,
    {
        let mut step = schedule.next();
        let mut state: Option<O> = None;
        let mut attempts = 0usize;

        loop {
            self.ensure_active().map_err(|c| cancelled(c, attempts))?;
            attempts += 1;
            let input = match self.attempt(block()).await.map_err(|c| cancelled(c, attempts))? {
                Ok(input) => input,
                Err(error) => {
                    if self.classifier.is_fatal(&error) {
                        tracing::error!(attempts, "repeat aborted by fatal error");
                        return Err(ScheduleError::Fatal(error));
                    }
                    tracing::debug!(attempts, "repeat block failed; using fallback");
                    return Ok(Either::Left(or_else(error, state)));
                }
            };
            match step(&input) {
                Decision::Done(output) => {
                    tracing::debug!(attempts, "repeat schedule done");
                    return Ok(Either::Right(output));
                }
                Decision::Continue { output, delay, next } => {
                    tracing::debug!(attempts, ?delay, "repeat schedule continuing");
                    self.wait(delay).await.map_err(|c| cancelled(c, attempts))?;
                    state = Some(output);
                    step = next;
                }
            }
        }
    }

    /// Retry `action` while the schedule continues.
    /// On exhaustion the last error is returned as [`ScheduleError::Exhausted`].
    pub async fn retry<T, O, E, F, Fut>(
        &self,
        schedule: &Schedule<E, O>,
        action: F,
    ) -> Result<T, ScheduleError<E>>
    where
        C: Classifier<E>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.run_retry(schedule, action).await? {
            RetryOutcome::Succeeded(value) => Ok(value),
            RetryOutcome::Exhausted { error, attempts, .. } => {
                Err(ScheduleError::Exhausted { attempts, error })
            }
        }
    }

    /// Retry `action`; on exhaustion the result is `or_else(last_error, schedule_output)`.
    pub async fn retry_or_else<T, O, E, F, Fut, H>(
        &self,
        schedule: &Schedule<E, O>,
        action: F,
        or_else: H,
    ) -> Result<T, ScheduleError<E>>
    where
        C: Classifier<E>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnOnce(E, O) -> T,
    {
        self.retry_or_else_either(schedule, action, or_else).await.map(Either::merge)
    }

    /// Retry `action`; success comes back on the `Right`, the fallback on the `Left`.
    pub async fn retry_or_else_either<T, O, E, A, F, Fut, H>(
        &self,
        schedule: &Schedule<E, O>,
        action: F,
        or_else: H,
    ) -> Result<Either<A, T>, ScheduleError<E>>
    where
        C: Classifier<E>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnOnce(E, O) -> A,
    {
        Ok(match self.run_retry(schedule, action).await? {
            RetryOutcome::Succeeded(value) => Either::Right(value),
            RetryOutcome::Exhausted { error, output, .. } => Either::Left(or_else(error, output)),
        })
    }

    async fn run_retry<T, O, E, F, Fut>(
        &self,
        schedule: &Schedule<E, O>,
        mut action: F,
    ) -> Result<RetryOutcome<T, E, O>, ScheduleError<E>>
    where
        C: Classifier<E>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut step = schedule.next();
        let mut attempts = 0usize;

        loop {
            self.ensure_active().map_err(|c| cancelled(c, attempts))?;
            attempts += 1;
            let error = match self.attempt(action()).await.map_err(|c| cancelled(c, attempts))? {
                Ok(value) => {
                    if attempts > 1 {
                        tracing::debug!(attempts, "retry succeeded");
                    }
                    return Ok(RetryOutcome::Succeeded(value));
                }
                Err(error) => error,
            };
            if self.classifier.is_fatal(&error) {
                tracing::error!(attempts, "retry aborted by fatal error");
                return Err(ScheduleError::Fatal(error));
            }
            match step(&error) {
                Decision::Continue { delay, next, .. } => {
                    tracing::debug!(attempts, ?delay, "retrying after failure");
                    self.wait(delay).await.map_err(|c| cancelled(c, attempts))?;
                    step = next;
                }
                Decision::Done(output) => {
                    tracing::warn!(attempts, "retry schedule exhausted");
                    return Ok(RetryOutcome::Exhausted { error, output, attempts });
                }
            }
        }
    }
}

fn cancelled(signal: Cancelled, attempts: usize) -> Cancelled {
    tracing::info!(attempts, "schedule driver cancelled");
    signal
}

/// Builder for [`Driver`].
pub struct DriverBuilder<C = NonFatal> {
    sleeper: Arc<dyn Sleeper>,
    cancellation: CancellationToken,
    classifier: C,
}

impl DriverBuilder<NonFatal> {
    /// Tokio sleeper, a token nobody else holds, and every error recoverable.
    pub fn new() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
            cancellation: CancellationToken::new(),
            classifier: NonFatal,
        }
    }
}

impl Default for DriverBuilder<NonFatal> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> DriverBuilder<C> {
    /// Provide a custom sleeper implementation.
    pub fn sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Observe `token`; cancelling it (or a parent) aborts runs of the built driver.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Decide which errors bypass the schedule.
    pub fn classifier<K>(self, classifier: K) -> DriverBuilder<K> {
        DriverBuilder { sleeper: self.sleeper, cancellation: self.cancellation, classifier }
    }

    pub fn build(self) -> Driver<C> {
        Driver { sleeper: self.sleeper, cancellation: self.cancellation, classifier: self.classifier }
    }
}

/// Run directly on a schedule with [`Driver::default`]: tokio sleeps, no external cancellation,
/// every error recoverable.
impl<I, O> Schedule<I, O> {
    /// See [`Driver::repeat`].
    pub async fn repeat<E, F, Fut>(&self, block: F) -> Result<O, ScheduleError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<I, E>>,
    {
        Driver::default().repeat(self, block).await
    }

    /// See [`Driver::repeat_or_else`].
    pub async fn repeat_or_else<E, F, Fut, H>(&self, block: F, or_else: H) -> Result<O, ScheduleError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<I, E>>,
        H: FnOnce(E, Option<O>) -> O,
    {
        Driver::default().repeat_or_else(self, block, or_else).await
    }

    /// See [`Driver::repeat_or_else_either`].
    pub async fn repeat_or_else_either<E, A, F, Fut, H>(
        &self,
        block: F,
        or_else: H,
    ) -> Result<Either<A, O>, ScheduleError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<I, E>>,
        H: FnOnce(E, Option<O>) -> A,
    {
        Driver::default().repeat_or_else_either(self, block, or_else).await
    }
}

impl<E, O> Schedule<E, O> {
    /// See [`Driver::retry`].
    pub async fn retry<T, F, Fut>(&self, action: F) -> Result<T, ScheduleError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        Driver::default().retry(self, action).await
    }

    /// See [`Driver::retry_or_else`].
    pub async fn retry_or_else<T, F, Fut, H>(&self, action: F, or_else: H) -> Result<T, ScheduleError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnOnce(E, O) -> T,
    {
        Driver::default().retry_or_else(self, action, or_else).await
    }

    /// See [`Driver::retry_or_else_either`].
    pub async fn retry_or_else_either<T, A, F, Fut, H>(
        &self,
        action: F,
        or_else: H,
    ) -> Result<Either<A, T>, ScheduleError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnOnce(E, O) -> A,
    {
        Driver::default().retry_or_else_either(self, action, or_else).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorClass;
    use crate::sleeper::{InstantSleeper, TrackingSleeper};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("TestError: {0}")]
    struct TestError(String);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn instant() -> Driver {
        Driver::builder().sleeper(InstantSleeper).build()
    }

    #[tokio::test]
    async fn repeat_runs_block_until_schedule_done() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let result = instant()
            .repeat(&Schedule::<usize, u64>::recurs(4), || {
                let c = c.clone();
                async move { Ok::<_, TestError>(c.fetch_add(1, Ordering::SeqCst)) }
            })
            .await;
        assert_eq!(result.unwrap(), 4);
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn repeat_feeds_block_results_to_schedule() {
        let mut next = 0u32;
        let schedule = Schedule::<u32, u32>::recur_until(|input, _| *input >= 3).collect();
        let result = instant()
            .repeat(&schedule, || {
                next += 1;
                let value = next;
                async move { Ok::<_, TestError>(value) }
            })
            .await;
        // collect reports what it had before the terminal input
        assert_eq!(result.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn repeat_reraises_block_error() {
        let result = instant()
            .repeat(&Schedule::<(), u64>::forever(), || async {
                Err::<(), _>(TestError("boom".into()))
            })
            .await;
        assert_eq!(result.unwrap_err(), ScheduleError::Inner(TestError("boom".into())));
    }

    #[tokio::test]
    async fn repeat_or_else_passes_last_state() {
        let mut calls = 0;
        let result = instant()
            .repeat_or_else(
                &Schedule::<(), u64>::forever().map(|n| n * 100),
                || {
                    calls += 1;
                    let call = calls;
                    async move {
                        if call <= 3 {
                            Ok(())
                        } else {
                            Err(TestError("stop".into()))
                        }
                    }
                },
                |_, last| last.map(|n| n + 1).unwrap_or(0),
            )
            .await;
        assert_eq!(result.unwrap(), 201);
    }

    #[tokio::test]
    async fn repeat_or_else_either_reports_none_on_first_failure() {
        let result = instant()
            .repeat_or_else_either(
                &Schedule::<(), u64>::forever(),
                || async { Err::<(), _>(TestError("early".into())) },
                |error, last| (error.0, last),
            )
            .await
            .unwrap();
        assert_eq!(result, Either::Left(("early".to_string(), None)));
    }

    #[tokio::test]
    async fn zero_delays_skip_the_sleeper() {
        let sleeper = TrackingSleeper::new();
        let driver = Driver::builder().sleeper(sleeper.clone()).build();
        driver
            .repeat(&Schedule::<(), u64>::recurs(3), || async { Ok::<_, TestError>(()) })
            .await
            .unwrap();
        assert_eq!(sleeper.call_count(), 0);
    }

    #[tokio::test]
    async fn retry_success_bypasses_schedule() {
        let consulted = Arc::new(AtomicUsize::new(0));
        let c = consulted.clone();
        let schedule = Schedule::<TestError, u64>::forever().log(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let value = instant().retry(&schedule, || async { Ok::<_, TestError>(7) }).await;
        assert_eq!(value.unwrap(), 7);
        assert_eq!(consulted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retry_feeds_errors_as_schedule_input() {
        let sleeper = TrackingSleeper::new();
        let driver = Driver::builder().sleeper(sleeper.clone()).build();
        let schedule = Schedule::<TestError, Duration>::linear(ms(10))
            .do_while(|error, _| error.0 != "permanent");
        let mut calls = 0;
        let result = driver
            .retry(&schedule, || {
                calls += 1;
                let call = calls;
                async move {
                    let reason = if call < 3 { "transient" } else { "permanent" };
                    Err::<(), _>(TestError(reason.into()))
                }
            })
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.into_inner(), Some(TestError("permanent".into())));
        assert_eq!(sleeper.calls(), vec![ms(10), ms(20)]);
    }

    #[tokio::test]
    async fn fatal_errors_never_reach_the_schedule() {
        let consulted = Arc::new(AtomicUsize::new(0));
        let c = consulted.clone();
        let schedule = Schedule::<TestError, u64>::forever().log(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let driver = Driver::builder()
            .sleeper(InstantSleeper)
            .classifier(|e: &TestError| {
                if e.0 == "fatal" {
                    ErrorClass::Fatal
                } else {
                    ErrorClass::Recoverable
                }
            })
            .build();

        let mut calls = 0;
        let result = driver
            .retry_or_else(
                &schedule,
                || {
                    calls += 1;
                    let call = calls;
                    async move {
                        Err::<u8, _>(TestError(if call == 1 { "flaky" } else { "fatal" }.into()))
                    }
                },
                |_, _| 0,
            )
            .await;
        assert_eq!(result.unwrap_err(), ScheduleError::Fatal(TestError("fatal".into())));
        assert_eq!(consulted.load(Ordering::SeqCst), 1, "only the recoverable error was fed");
    }

    #[tokio::test]
    async fn fatal_errors_bypass_repeat_fallback() {
        let driver = Driver::builder()
            .sleeper(InstantSleeper)
            .classifier(|_: &TestError| ErrorClass::Fatal)
            .build();
        let fallback_called = Arc::new(AtomicUsize::new(0));
        let f = fallback_called.clone();
        let result = driver
            .repeat_or_else(
                &Schedule::<(), u64>::forever(),
                || async { Err::<(), _>(TestError("oom".into())) },
                move |_, _| {
                    f.fetch_add(1, Ordering::SeqCst);
                    0
                },
            )
            .await;
        assert!(result.unwrap_err().is_fatal());
        assert_eq!(fallback_called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pre_cancelled_driver_never_runs_action() {
        let token = CancellationToken::new();
        token.cancel();
        let driver = Driver::builder().cancellation(token).build();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let result = driver
            .retry(&Schedule::<TestError, u64>::forever(), || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TestError>(())
                }
            })
            .await;
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(driver.ensure_active().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_running_action() {
        let token = CancellationToken::new();
        let driver = Driver::builder().cancellation(token.clone()).build();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(ms(10)).await;
            token.cancel();
        });
        let result = driver
            .repeat(&Schedule::<(), u64>::forever(), || async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok::<_, TestError>(())
            })
            .await;
        canceller.await.unwrap();
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn schedule_methods_use_default_driver() {
        let value = Schedule::<(), u64>::recurs(2)
            .repeat(|| async { Ok::<_, TestError>(()) })
            .await
            .unwrap();
        assert_eq!(value, 2);

        let fallback = Schedule::<TestError, u64>::recurs(0)
            .retry_or_else_either(|| async { Err::<(), _>(TestError("x".into())) }, |e, n| (e, n))
            .await
            .unwrap();
        assert_eq!(fallback, Either::Left((TestError("x".into()), 0)));
    }

    #[test]
    fn debug_reports_cancellation_state() {
        let driver = instant();
        driver.cancellation().cancel();
        assert!(format!("{:?}", driver).contains("cancelled: true"));
    }
}
