use std::time::SystemTime;

use crate::time::{TimeSource, unix_millis};

/// The operating system's wall clock.
///
/// Every call performs a `SystemTime::now()` syscall, so the returned values
/// follow NTP steps and manual adjustments, including steps backwards. Use
/// [`MonotonicClock`] when that is undesirable.
///
/// [`MonotonicClock`]: crate::MonotonicClock
#[derive(Default, Clone, Copy, Debug)]
pub struct SystemClock;

impl TimeSource<i64> for SystemClock {
    fn current_millis(&self) -> i64 {
        unix_millis(SystemTime::now())
    }
}
