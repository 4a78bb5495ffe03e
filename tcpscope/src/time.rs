/*! Time structures.

Capture records carry absolute timestamps with a resolution of either micro- or nanoseconds. Both
are normalized to an [Instant] counting nanoseconds since the unix epoch.

 - [Instant] is used to represent absolute time.
 - [Duration] is used to represent relative time.

[Instant]: struct.Instant.html
[Duration]: https://doc.rust-lang.org/core/time/struct.Duration.html
*/
use core::{fmt, ops};
pub use core::time::Duration;

/// A representation of an absolute capture time.
///
/// The `Instant` type is a wrapper around a `i64` value that represents a number of nanoseconds
/// since the unix epoch. That is enough for timestamps until the year 2262.
///
/// * A value of `0` is the epoch itself. Synthetic captures often start there.
/// * A value less than `0` indicates a time before the epoch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instant {
    /// Nanoseconds since the unix epoch.
    pub nanos: i64,
}

impl Instant {
    /// Create a new `Instant` from a number of nanoseconds.
    pub fn from_nanos<T: Into<i64>>(nanos: T) -> Instant {
        Instant { nanos: nanos.into() }
    }

    /// Create a new `Instant` from a number of microseconds.
    pub fn from_micros<T: Into<i64>>(micros: T) -> Instant {
        Instant { nanos: micros.into().saturating_mul(1_000) }
    }

    /// Create a new `Instant` from a number of seconds.
    pub fn from_secs<T: Into<i64>>(secs: T) -> Instant {
        Instant { nanos: secs.into().saturating_mul(1_000_000_000) }
    }

    /// The fractional number of nanoseconds within the current second.
    pub fn subsec_nanos(&self) -> i64 {
        self.nanos.rem_euclid(1_000_000_000)
    }

    /// The number of whole seconds that have passed since the epoch.
    pub fn secs(&self) -> i64 {
        self.nanos.div_euclid(1_000_000_000)
    }

    /// The total number of nanoseconds that have passed since the epoch.
    pub fn total_nanos(&self) -> i64 {
        self.nanos
    }

    /// The time that has passed since `earlier`, or zero if `earlier` is actually later.
    ///
    /// Capture timestamps come from the recording host and are not guaranteed to be monotonic.
    pub fn saturating_duration_since(self, earlier: Instant) -> Duration {
        let delta = self.nanos.saturating_sub(earlier.nanos);
        Duration::from_nanos(delta.max(0) as u64)
    }

    /// The signed number of seconds from `earlier` to `self`.
    pub fn secs_since(self, earlier: Instant) -> f64 {
        self.nanos.wrapping_sub(earlier.nanos) as f64 / 1e9
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:09}s", self.secs(), self.subsec_nanos())
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_nanos(self.nanos + rhs.as_nanos() as i64)
    }
}

impl ops::AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        self.nanos += rhs.as_nanos() as i64;
    }
}

impl ops::Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_nanos(self.nanos - rhs.as_nanos() as i64)
    }
}

impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_nanos((self.nanos - rhs.nanos).unsigned_abs())
    }
}
