#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Nine Lives Schedule 🐱
//!
//! Composable retry and repeat schedules for async Rust.
//!
//! A [`Schedule`] is an immutable value describing *whether* to go again, *how long* to wait
//! first, and *what* to report. Schedules compose: sequence them, race them, require both,
//! reshape their outputs and delays. Drivers then run your async code under a schedule:
//!
//! - **repeat** runs a block while the schedule continues on its successes
//! - **retry** runs an action while the schedule continues on its failures
//!
//! ## Features
//!
//! - **Constructors**: spaced, recurs, forever, identity, unfold, linear, exponential, fibonacci
//! - **Combinators**: map, and_then, pipe, and/or (with custom merges), fold, collect, jitter
//! - **Cancellation** via [`tokio_util::sync::CancellationToken`], observed during every wait
//! - **Error classification** so fatal errors bypass the schedule
//! - **Injectable sleepers** for deterministic tests
//!
//! ## Quick Start
//!
//! ```rust
//! use ninelives_schedule::{Schedule, ScheduleError};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     // exponential backoff from 1ms, at most 3 retries
//!     let policy = Schedule::<std::io::Error, u64>::recurs(3)
//!         .zip_left(&Schedule::exponential(Duration::from_millis(1)));
//!
//!     let result: Result<&str, ScheduleError<std::io::Error>> = policy
//!         .retry(|| async {
//!             // Your async operation here
//!             Ok("connected")
//!         })
//!         .await;
//!     assert_eq!(result.unwrap(), "connected");
//! }
//! ```

pub mod backoff;
pub mod classify;
pub mod decision;
pub mod driver;
pub mod either;
pub mod error;
pub mod jitter;
pub mod presets;
pub mod prelude;
pub mod schedule;
pub mod sleeper;

// Re-exports
pub use backoff::{Backoff, BackoffError, MAX_BACKOFF};
pub use classify::{Classifier, ErrorClass, NonFatal};
pub use decision::{Decision, Next};
pub use driver::{Driver, DriverBuilder};
pub use either::Either;
pub use error::{Cancelled, ScheduleError};
pub use jitter::{Jitter, JitterError};
pub use schedule::Schedule;
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
