//! Time source for beacon cadence checks and session tokens.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Monotonic time source in hundredths of a second.
pub trait Clock {
    /// Current time in 1/100 s. Must never go backwards.
    fn now(&self) -> u64;
}

fn centis(d: Duration) -> u64 {
    u64::try_from(d.as_millis() / 10).unwrap_or(u64::MAX)
}

/// Wall-clock anchored, monotonic clock.
///
/// Reads the system time once at construction and advances with
/// [`Instant`] afterwards, so values look like timestamps but never jump
/// backwards when the system clock is adjusted.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
    base: u64,
}

impl SystemClock {
    /// Create a clock anchored at the current system time.
    pub fn new() -> Self {
        let base = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(centis)
            .unwrap_or(0);

        Self {
            origin: Instant::now(),
            base,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        self.base
            .saturating_add(centis(self.origin.elapsed()))
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> u64 {
        (**self).now()
    }
}
