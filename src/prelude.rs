//! Convenient re-exports for building and driving schedules.
pub use crate::{
    backoff::{Backoff, BackoffError, MAX_BACKOFF},
    classify::{Classifier, ErrorClass, NonFatal},
    decision::{Decision, Next},
    driver::{Driver, DriverBuilder},
    either::Either,
    error::{Cancelled, ScheduleError},
    jitter::{Jitter, JitterError},
    presets,
    schedule::Schedule,
    sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper},
};
pub use tokio_util::sync::CancellationToken;
