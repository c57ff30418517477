//! Time types for the canopy protocol.
//!
//! All protocol time is expressed in monotonic ticks (milliseconds) read from
//! the platform [`Clock`](crate::traits::Clock). Values are passed explicitly
//! so the protocol can run under a simulated clock.
//!
//! [`ClockOffset`] carries the signed correction a node applies to its raw
//! clock after a synchronization round; `raw + offset` is the node's adjusted
//! clock, which is what slot boundaries are expressed in.

use core::ops::{Add, AddAssign, Sub, SubAssign};

/// Monotonic timestamp in ticks (milliseconds).
///
/// Wraps a u64 to keep raw tick counts from mixing with durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Zero timestamp (boot).
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from ticks.
    #[inline]
    pub const fn from_ticks(ticks: u64) -> Self {
        Timestamp(ticks)
    }

    /// Create a timestamp from seconds.
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(secs.saturating_mul(1000))
    }

    /// Get the timestamp as ticks.
    #[inline]
    pub const fn as_ticks(self) -> u64 {
        self.0
    }

    /// Saturating subtraction of another timestamp, returning a duration.
    #[inline]
    pub const fn saturating_sub(self, other: Timestamp) -> Duration {
        Duration(self.0.saturating_sub(other.0))
    }

    /// Checked addition of a duration.
    #[inline]
    pub const fn checked_add(self, duration: Duration) -> Option<Timestamp> {
        match self.0.checked_add(duration.0) {
            Some(t) => Some(Timestamp(t)),
            None => None,
        }
    }

    /// Apply a signed clock offset, saturating at zero.
    #[inline]
    pub fn offset_by(self, offset: ClockOffset) -> Timestamp {
        Timestamp(self.0.saturating_add_signed(offset.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 + rhs.0)
    }
}

impl AddAssign<Duration> for Timestamp {
    #[inline]
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Timestamp) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn sub(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 - rhs.0)
    }
}

/// Duration in ticks (milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(u64);

impl Duration {
    /// Zero duration.
    pub const ZERO: Duration = Duration(0);

    /// Create a duration from ticks.
    #[inline]
    pub const fn from_ticks(ticks: u64) -> Self {
        Duration(ticks)
    }

    /// Create a duration from seconds.
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Duration(secs.saturating_mul(1000))
    }

    /// Get the duration as ticks.
    #[inline]
    pub const fn as_ticks(self) -> u64 {
        self.0
    }

    /// Integer division into `n` equal parts, remainder discarded.
    ///
    /// Returns [`Duration::ZERO`] when `n` is zero; the caller treats an
    /// empty partition as "no slots this cycle" rather than an error.
    #[inline]
    pub const fn div_floor(self, n: u64) -> Duration {
        if n == 0 {
            Duration::ZERO
        } else {
            Duration(self.0 / n)
        }
    }

    /// Saturating subtraction.
    #[inline]
    pub const fn saturating_sub(self, other: Duration) -> Self {
        Duration(self.0.saturating_sub(other.0))
    }

    /// Saturating multiplication.
    #[inline]
    pub const fn saturating_mul(self, n: u64) -> Self {
        Duration(self.0.saturating_mul(n))
    }
}

impl Add for Duration {
    type Output = Duration;

    #[inline]
    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0 + rhs.0)
    }
}

impl AddAssign for Duration {
    #[inline]
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl Sub for Duration {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Duration) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl SubAssign for Duration {
    #[inline]
    fn sub_assign(&mut self, rhs: Duration) {
        self.0 -= rhs.0;
    }
}

/// Signed correction between a node's raw clock and the mesh reference clock.
///
/// Produced once per synchronization round and applied to every raw clock
/// read until the next round. A fresh node (or one that has just reset)
/// carries [`ClockOffset::ZERO`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockOffset(i64);

impl ClockOffset {
    /// No correction.
    pub const ZERO: ClockOffset = ClockOffset(0);

    /// Offset that maps `raw` onto `reference`: `raw + offset == reference`.
    #[inline]
    pub fn between(reference: Timestamp, raw: Timestamp) -> Self {
        ClockOffset(reference.0 as i64 - raw.0 as i64)
    }

    /// Raw-clock instant corresponding to an adjusted-clock `target`.
    ///
    /// This is what a node arms its wakeup timer with when the slot plan
    /// names a boundary in adjusted time.
    #[inline]
    pub fn raw_for(self, target: Timestamp) -> Timestamp {
        Timestamp(target.0.saturating_add_signed(-self.0))
    }

    /// The offset as signed ticks.
    #[inline]
    pub const fn as_ticks(self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_creation() {
        let t = Timestamp::from_secs(5);
        assert_eq!(t.as_ticks(), 5000);
        assert_eq!(Timestamp::from_ticks(1500).as_ticks(), 1500);
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let t1 = Timestamp::from_secs(10);
        let d = Duration::from_secs(5);

        assert_eq!((t1 + d).as_ticks(), 15_000);
        assert_eq!((Timestamp::from_secs(20) - t1).as_ticks(), 10_000);
        assert_eq!(t1.saturating_sub(Timestamp::from_secs(30)), Duration::ZERO);
    }

    #[test]
    fn test_duration_partition() {
        let w = Duration::from_ticks(1000);
        assert_eq!(w.div_floor(3).as_ticks(), 333);
        assert_eq!(w.div_floor(0), Duration::ZERO);
    }

    #[test]
    fn test_offset_roundtrip() {
        let raw = Timestamp::from_ticks(400);
        let reference = Timestamp::from_ticks(1000);

        let offset = ClockOffset::between(reference, raw);
        assert_eq!(offset.as_ticks(), 600);
        assert_eq!(raw.offset_by(offset), reference);
        assert_eq!(offset.raw_for(reference), raw);
    }

    #[test]
    fn test_negative_offset() {
        let raw = Timestamp::from_ticks(1000);
        let reference = Timestamp::from_ticks(400);

        let offset = ClockOffset::between(reference, raw);
        assert_eq!(offset.as_ticks(), -600);
        assert_eq!(raw.offset_by(offset), reference);
        assert_eq!(offset.raw_for(reference), raw);
    }
}
