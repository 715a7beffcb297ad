//! Fatal/recoverable classification of action errors.
//!
//! Drivers consult a [`Classifier`] before an error reaches a schedule. Fatal errors are returned
//! as [`ScheduleError::Fatal`](crate::ScheduleError::Fatal) straight away and never become
//! schedule input; recoverable ones are fed to the schedule (`retry`) or to the fallback
//! (`repeat`).
//!
//! Any `Fn(&E) -> ErrorClass` is a classifier:
//! ```rust
//! use ninelives_schedule::{Classifier, ErrorClass};
//! use std::io;
//!
//! let classify = |e: &io::Error| match e.kind() {
//!     io::ErrorKind::PermissionDenied => ErrorClass::Fatal,
//!     _ => ErrorClass::Recoverable,
//! };
//! let denied = io::Error::from(io::ErrorKind::PermissionDenied);
//! assert_eq!(classify.classify(&denied), ErrorClass::Fatal);
//! ```

/// How a driver must treat an error produced by the user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Propagate immediately, bypassing the schedule and any fallback.
    Fatal,
    /// Eligible as schedule input.
    Recoverable,
}

/// Decides whether an error is fatal.
pub trait Classifier<E>: Send + Sync {
    fn classify(&self, error: &E) -> ErrorClass;

    fn is_fatal(&self, error: &E) -> bool {
        self.classify(error) == ErrorClass::Fatal
    }
}

/// Default classifier: every error value is recoverable.
///
/// Panics are the fatal channel in Rust and unwind through the driver without being observed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonFatal;

impl<E> Classifier<E> for NonFatal {
    fn classify(&self, _error: &E) -> ErrorClass {
        ErrorClass::Recoverable
    }
}

impl<E, F> Classifier<E> for F
where
    F: Fn(&E) -> ErrorClass + Send + Sync,
{
    fn classify(&self, error: &E) -> ErrorClass {
        self(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_fatal_accepts_everything() {
        assert_eq!(Classifier::<&str>::classify(&NonFatal, &"boom"), ErrorClass::Recoverable);
        assert!(!Classifier::<u8>::is_fatal(&NonFatal, &0));
    }

    #[test]
    fn closures_classify() {
        let classifier = |code: &u16| if *code >= 500 { ErrorClass::Recoverable } else { ErrorClass::Fatal };
        assert!(classifier.is_fatal(&404));
        assert_eq!(classifier.classify(&503), ErrorClass::Recoverable);
    }
}
