//! Error types for schedule drivers

/// Why a driver stopped without producing a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError<E> {
    /// The cancellation token fired before an attempt, during an attempt, or during a wait.
    #[error("schedule driver cancelled")]
    Cancelled,
    /// The classifier marked the error fatal; the schedule never saw it.
    #[error("fatal error: {0}")]
    Fatal(#[source] E),
    /// A recoverable error from a repeated block, re-raised by `repeat`.
    #[error("{0}")]
    Inner(#[source] E),
    /// The retry schedule reached `Done` while the action was still failing.
    #[error("retry exhausted after {attempts} attempts; last error: {error}")]
    Exhausted {
        attempts: usize,
        #[source]
        error: E,
    },
}

impl<E> ScheduleError<E> {
    /// Check if the driver was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if a fatal error bypassed the schedule
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Check if the retry schedule was exhausted
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Number of attempts made before exhaustion, if applicable.
    pub fn attempts(&self) -> Option<usize> {
        match self {
            Self::Exhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Borrow the user error, if this variant carries one.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Fatal(e) | Self::Inner(e) | Self::Exhausted { error: e, .. } => Some(e),
            Self::Cancelled => None,
        }
    }

    /// Extract the user error, if this variant carries one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Fatal(e) | Self::Inner(e) | Self::Exhausted { error: e, .. } => Some(e),
            Self::Cancelled => None,
        }
    }
}

/// Raised by the cancellation check and by cancellable waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;

impl<E> From<Cancelled> for ScheduleError<E> {
    fn from(_: Cancelled) -> Self {
        ScheduleError::Cancelled
    }
}
