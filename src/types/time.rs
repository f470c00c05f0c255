//! Monotonic time representation.
//!
//! [`Time`] is a nanosecond timestamp on an arbitrary monotonic epoch,
//! wide enough (i128) that second-scale values multiplied out to
//! nanoseconds never overflow. [`Clock`] anchors the epoch at an
//! `Instant` taken at construction, so readings can never go backwards.

use core::fmt;
use core::ops::{Add, Sub};
use std::time::{Duration, Instant};

/// A point in time, in nanoseconds since an arbitrary monotonic epoch.
///
/// Values may be negative: a deadline computed as "now minus a
/// millisecond" is perfectly valid and simply compares as already past.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(i128);

impl Time {
    /// The epoch itself.
    pub const ZERO: Self = Self(0);

    /// Creates a timestamp from raw nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: i128) -> Self {
        Self(nanos)
    }

    /// Creates a timestamp from microseconds.
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros as i128 * 1_000)
    }

    /// Creates a timestamp from milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis as i128 * 1_000_000)
    }

    /// Creates a timestamp from seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs as i128 * 1_000_000_000)
    }

    /// Returns the raw nanosecond value.
    #[must_use]
    pub const fn as_nanos(self) -> i128 {
        self.0
    }

    /// Returns the value truncated to whole milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> i128 {
        self.0 / 1_000_000
    }

    /// Adds a nanosecond offset, saturating at the numeric limits.
    #[must_use]
    pub const fn saturating_add_nanos(self, nanos: i128) -> Self {
        Self(self.0.saturating_add(nanos))
    }

    /// Subtracts a nanosecond offset, saturating at the numeric limits.
    #[must_use]
    pub const fn saturating_sub_nanos(self, nanos: i128) -> Self {
        Self(self.0.saturating_sub(nanos))
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is in the future.
    #[must_use]
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        let nanos = self.0.saturating_sub(earlier.0);
        if nanos <= 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
    }
}

fn duration_nanos(duration: Duration) -> i128 {
    i128::try_from(duration.as_nanos()).unwrap_or(i128::MAX)
}

impl Add<Duration> for Time {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        self.saturating_add_nanos(duration_nanos(rhs))
    }
}

impl Sub<Duration> for Time {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self {
        self.saturating_sub_nanos(duration_nanos(rhs))
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({}ns)", self.0)
    }
}

/// A monotonic clock.
///
/// The epoch is the instant the clock was created; readings are the
/// elapsed time since then. Cloning a clock preserves the epoch, so all
/// handles derived from one clock agree on `now`.
#[derive(Debug, Clone)]
pub struct Clock {
    base: Instant,
}

impl Clock {
    /// Creates a clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
        }
    }

    /// Returns the current monotonic time.
    #[must_use]
    pub fn now(&self) -> Time {
        Time::from_nanos(i128::try_from(self.base.elapsed().as_nanos()).unwrap_or(i128::MAX))
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
