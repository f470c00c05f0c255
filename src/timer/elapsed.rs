//! Elapsed error type for timeout operations.

use core::fmt;

use crate::types::Time;

/// Error returned when a deadline passes before the wrapped future
/// completes.
///
/// The inner future has been dropped without producing a value by the
/// time this error is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    deadline: Time,
}

impl Elapsed {
    /// Creates a new `Elapsed` error with the deadline that passed.
    #[must_use]
    pub const fn new(deadline: Time) -> Self {
        Self { deadline }
    }

    /// Returns the deadline that was exceeded.
    #[must_use]
    pub const fn deadline(&self) -> Time {
        self.deadline
    }
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deadline has elapsed at {:?}", self.deadline)
    }
}

impl std::error::Error for Elapsed {}

impl From<Elapsed> for crate::error::Error {
    fn from(_: Elapsed) -> Self {
        Self::new(crate::error::ErrorKind::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_the_deadline() {
        let elapsed = Elapsed::new(Time::from_secs(5));
        assert_eq!(elapsed.deadline(), Time::from_secs(5));
    }

    #[test]
    fn display_names_the_deadline() {
        let rendered = Elapsed::new(Time::from_millis(1)).to_string();
        assert!(rendered.contains("elapsed"), "got: {rendered}");
    }

    #[test]
    fn converts_to_a_timeout_error() {
        let err: crate::error::Error = Elapsed::new(Time::ZERO).into();
        assert_eq!(err.kind(), crate::error::ErrorKind::Timeout);
    }
}
