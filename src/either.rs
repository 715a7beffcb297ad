//! Two-sided value used where neither side is an error.
//!
//! `and_then` tags the outputs of its first schedule `Left` and of its second schedule `Right`;
//! the `*_or_else_either` drivers return the fallback on the `Left` and the successful value on
//! the `Right`.

/// A value that is either `Left(L)` or `Right(R)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L, R> Either<L, R> {
    pub fn is_left(&self) -> bool {
        matches!(self, Either::Left(_))
    }

    pub fn is_right(&self) -> bool {
        matches!(self, Either::Right(_))
    }

    pub fn left(self) -> Option<L> {
        match self {
            Either::Left(l) => Some(l),
            Either::Right(_) => None,
        }
    }

    pub fn right(self) -> Option<R> {
        match self {
            Either::Left(_) => None,
            Either::Right(r) => Some(r),
        }
    }

    /// Collapse both sides into one value.
    pub fn fold<T>(self, on_left: impl FnOnce(L) -> T, on_right: impl FnOnce(R) -> T) -> T {
        match self {
            Either::Left(l) => on_left(l),
            Either::Right(r) => on_right(r),
        }
    }

    pub fn map_left<T>(self, f: impl FnOnce(L) -> T) -> Either<T, R> {
        match self {
            Either::Left(l) => Either::Left(f(l)),
            Either::Right(r) => Either::Right(r),
        }
    }

    pub fn map_right<T>(self, f: impl FnOnce(R) -> T) -> Either<L, T> {
        match self {
            Either::Left(l) => Either::Left(l),
            Either::Right(r) => Either::Right(f(r)),
        }
    }
}

impl<T> Either<T, T> {
    /// Return whichever side is present.
    pub fn merge(self) -> T {
        match self {
            Either::Left(v) | Either::Right(v) => v,
        }
    }
}
