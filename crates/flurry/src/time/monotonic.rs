use std::time::{Instant, SystemTime};

use crate::time::{TimeSource, duration_millis, unix_millis};

/// A wall-clock aligned time source that never goes backward.
///
/// The wall clock is sampled exactly once, at construction. Afterwards the
/// clock advances with the elapsed monotonic time (`Instant`), so NTP steps
/// and manual adjustments of the system clock are invisible to it. The price
/// is drift: the longer the clock lives, the further it may wander from the
/// system's idea of "now".
///
/// Pairing this clock with [`Policy::WallClock`] gives a worker that keeps
/// real elapsed time in its identifiers without ever observing a rollback.
///
/// # Example
///
/// ```
/// use flurry::{MonotonicClock, TimeSource};
///
/// let clock = MonotonicClock::new();
/// let a = clock.current_millis();
/// std::thread::sleep(std::time::Duration::from_millis(2));
/// assert!(clock.current_millis() >= a + 2);
/// ```
///
/// [`Policy::WallClock`]: crate::Policy::WallClock
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    anchor_millis: i64,
    started: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Anchors a new clock to the current system time.
    pub fn new() -> Self {
        let started = Instant::now();
        Self {
            anchor_millis: unix_millis(SystemTime::now()),
            started,
        }
    }
}

impl TimeSource<i64> for MonotonicClock {
    fn current_millis(&self) -> i64 {
        self.anchor_millis
            .saturating_add(duration_millis(self.started.elapsed()))
    }
}
