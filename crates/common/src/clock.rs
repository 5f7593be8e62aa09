//! Monotonic time for the Segmenter.
//!
//! The engine never reads the wall clock directly: every "now" comes through
//! a [`Clock`], so tests can drive refresh scheduling deterministically
//! instead of sleeping in real time.

use std::{
    fmt,
    sync::{
        Arc,
        Mutex,
    },
    time::{
        Duration,
        Instant,
    },
};

/// A point in monotonic time, relative to an arbitrary clock epoch.
///
/// `Timestamp::ZERO` stands in for "never happened", matching the source's
/// convention of using `0` for timestamps that haven't been set yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    pub fn is_never(self) -> bool {
        self == Self::ZERO
    }

    pub fn checked_add(self, rhs: Duration) -> Option<Timestamp> {
        self.0.checked_add(rhs).map(Timestamp)
    }

    /// Rounds up to the next multiple of `unit`, coalescing nearby deadlines
    /// onto shared wakeups. `Timestamp::ZERO` rounds to itself.
    pub fn round_up_to_multiple(self, unit: Duration) -> Timestamp {
        if unit.is_zero() || self.0.is_zero() {
            return self;
        }
        let unit_nanos = unit.as_nanos();
        let nanos = self.0.as_nanos();
        let remainder = nanos % unit_nanos;
        if remainder == 0 {
            self
        } else {
            Timestamp(self.0 + Duration::from_nanos((unit_nanos - remainder) as u64))
        }
    }

    pub fn as_duration_since_epoch(self) -> Duration {
        self.0
    }
}

impl std::ops::Sub for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Abstracts over "what time is it" so production code can use the real
/// monotonic clock and tests can advance time instantly and deterministically.
pub trait Clock: fmt::Debug + Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation, backed by [`std::time::Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.epoch.elapsed())
    }
}

/// A manually-advanceable clock for deterministic tests.
#[derive(Debug, Clone)]
pub struct TestClock {
    elapsed: Arc<Mutex<Duration>>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().expect("TestClock mutex poisoned");
        *elapsed += by;
    }

    pub fn set(&self, at: Timestamp) {
        let mut elapsed = self.elapsed.lock().expect("TestClock mutex poisoned");
        *elapsed = at.as_duration_since_epoch();
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Timestamp {
        Timestamp(*self.elapsed.lock().expect("TestClock mutex poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_is_zero() {
        assert!(Timestamp::ZERO.is_never());
        assert!(!Timestamp::ZERO
            .checked_add(Duration::from_secs(1))
            .unwrap()
            .is_never());
    }

    #[test]
    fn rounds_up_to_multiple_of_five_seconds() {
        let unit = Duration::from_secs(5);
        let t = Timestamp::ZERO.checked_add(Duration::from_secs(61)).unwrap();
        let rounded = t.round_up_to_multiple(unit);
        assert_eq!(rounded.as_duration_since_epoch(), Duration::from_secs(65));

        let exact = Timestamp::ZERO.checked_add(Duration::from_secs(60)).unwrap();
        assert_eq!(
            exact.round_up_to_multiple(unit).as_duration_since_epoch(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_clock_advances() {
        let clock = TestClock::new();
        assert!(clock.now().is_never());
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now().as_duration_since_epoch(), Duration::from_secs(5));
    }
}
