//! Wait primitive used by the drivers between attempts.
//!
//! The driver owns cancellation: it races every wait against its token and drops the sleep
//! future when the token fires. A sleeper therefore only has to resolve once `duration` has
//! elapsed (or immediately, in tests). Zero delays never reach the sleeper.

use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Suspends the current run for a schedule-chosen delay.
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Waits on the tokio timer; the default for [`Driver`](crate::Driver).
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Resolves at once, whatever the delay.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    fn sleep(&self, _: Duration) -> BoxFuture<'static, ()> {
        Box::pin(futures::future::ready(()))
    }
}

/// Records each requested delay and resolves at once. Clones share one log, so keep a clone
/// after handing the sleeper to a driver.
#[derive(Debug, Clone, Default)]
pub struct TrackingSleeper {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl TrackingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<Duration>> {
        self.waits.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every delay waited so far, in order.
    pub fn calls(&self) -> Vec<Duration> {
        self.log().clone()
    }

    pub fn call_count(&self) -> usize {
        self.log().len()
    }

    pub fn call_at(&self, index: usize) -> Option<Duration> {
        self.log().get(index).copied()
    }

    /// Sum of all recorded waits, saturating.
    pub fn total(&self) -> Duration {
        self.log().iter().fold(Duration::ZERO, |acc, d| acc.saturating_add(*d))
    }

    pub fn clear(&self) {
        self.log().clear();
    }
}

impl Sleeper for TrackingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.log().push(duration);
        Box::pin(futures::future::ready(()))
    }
}
