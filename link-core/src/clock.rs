//! Monotonic time abstractions consumed by the link tracker.
//!
//! Firmware feeds embassy instants, the emulator feeds either a virtual or a
//! wall clock, and tests use [`Millis`] directly. The tracker only ever asks
//! for the saturating distance between two instants.

use core::ops::Add;
use core::time::Duration;

/// Trait implemented by monotonic instant wrappers used for link tracking.
pub trait MonotonicInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Supplies the current time to the host loop driving the tracker.
pub trait ClockSource {
    type Instant: MonotonicInstant;

    fn now(&self) -> Self::Instant;
}

/// Millisecond timestamp relative to an arbitrary epoch (usually process start).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Millis(u64);

impl Millis {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_millis(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Duration elapsed since the epoch, handy for uptime rendering.
    #[must_use]
    pub const fn since_epoch(self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl MonotonicInstant for Millis {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Millis {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let delta = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_since_saturates_when_clock_appears_to_run_backwards() {
        let earlier = Millis::from_millis(500);
        let later = Millis::from_millis(200);

        assert_eq!(later.saturating_duration_since(earlier), Duration::ZERO);
        assert_eq!(
            earlier.saturating_duration_since(later),
            Duration::from_millis(300)
        );
    }

    #[test]
    fn adding_durations_advances_millis() {
        let start = Millis::from_millis(1_000);
        let next = start + Duration::from_millis(250);

        assert_eq!(next.as_millis(), 1_250);
        assert_eq!(next.since_epoch(), Duration::from_millis(1_250));
    }
}
