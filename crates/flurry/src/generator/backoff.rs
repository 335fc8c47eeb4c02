use core::time::Duration;

use crate::{RandSource, time::duration_millis};

/// Retry policy for [`Policy::WallClock`] workers.
///
/// A call makes up to `retries` attempts, sleeping a random whole number of
/// milliseconds in `[min, max]` after each retryable failure, then one last
/// attempt whose outcome is returned as is. Sleeps happen without holding the
/// worker's lock.
///
/// The default (3 retries, 1-5 ms) rides out an NTP step of a few
/// milliseconds, or a sequence exhausted within the current millisecond,
/// without the caller noticing.
///
/// [`Policy::WallClock`]: crate::Policy::WallClock
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Backoff {
    /// Attempts made before the final one.
    pub retries: u32,
    /// Shortest sleep between attempts.
    pub min: Duration,
    /// Longest sleep between attempts.
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            retries: 3,
            min: Duration::from_millis(1),
            max: Duration::from_millis(5),
        }
    }
}

impl Backoff {
    /// A policy that makes a single attempt and never sleeps.
    pub const NONE: Self = Self {
        retries: 0,
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub const fn new(retries: u32, min: Duration, max: Duration) -> Self {
        Self { retries, min, max }
    }

    /// Picks a delay in `[min, max]` at millisecond granularity.
    ///
    /// An inverted range collapses to `min`.
    pub fn delay<R: RandSource<u64>>(&self, rng: &R) -> Duration {
        let min = duration_millis(self.min).unsigned_abs();
        let max = duration_millis(self.max).unsigned_abs();
        if max <= min {
            return Duration::from_millis(min);
        }
        let span = (max - min).saturating_add(1);
        Duration::from_millis(min + rng.rand() % span)
    }
}
