//! Elapsed-time sources for the copy loop.
//!
//! All timestamps handed out by a [`Clock`] are offsets from the moment the clock was created, so
//! sampling math never sees wall-clock adjustments made while a transfer is running.

/// Source of monotonically non-decreasing elapsed time.
pub trait Clock {
    /// Time elapsed since the clock was started.
    fn elapsed(&self) -> std::time::Duration;
}

/// [`Clock`] backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: std::time::Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock for MonotonicClock {
    fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

/// Deterministic clock that moves forward by a fixed step every time it is read.
///
/// Used by tests to drive the sampling cadences without sleeping.
#[cfg(test)]
#[derive(Debug)]
pub struct SteppingClock {
    now: std::cell::Cell<std::time::Duration>,
    step: std::time::Duration,
}

#[cfg(test)]
impl SteppingClock {
    #[must_use]
    pub fn new(step: std::time::Duration) -> Self {
        Self {
            now: std::cell::Cell::new(std::time::Duration::ZERO),
            step,
        }
    }

    /// Moves the clock forward without reading it.
    pub fn advance(&self, by: std::time::Duration) {
        self.now.set(self.now.get() + by);
    }
}

#[cfg(test)]
impl Clock for SteppingClock {
    fn elapsed(&self) -> std::time::Duration {
        let now = self.now.get() + self.step;
        self.now.set(now);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn monotonic_clock_never_goes_back() {
        let clock = MonotonicClock::start();
        let first = clock.elapsed();
        let second = clock.elapsed();
        assert!(second >= first);
    }

    #[test]
    fn stepping_clock_moves_by_step() {
        let clock = SteppingClock::new(Duration::from_millis(100));
        assert_eq!(clock.elapsed(), Duration::from_millis(100));
        assert_eq!(clock.elapsed(), Duration::from_millis(200));
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.elapsed(), Duration::from_millis(1300));
    }
}
