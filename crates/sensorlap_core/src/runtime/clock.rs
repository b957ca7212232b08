//! Wall-clock sources.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" in Unix epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_epoch_ms(&self) -> i64;
}

/// Reads the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
            // Clock set before 1970; treat as epoch rather than failing.
            Err(_) => 0,
        }
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_epoch_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_epoch_ms: i64) -> Self {
        Self {
            now_epoch_ms: AtomicI64::new(now_epoch_ms),
        }
    }

    pub fn set(&self, now_epoch_ms: i64) {
        self.now_epoch_ms.store(now_epoch_ms, Ordering::SeqCst);
    }

    /// Moves the clock forward by `delta_ms` and returns the new value.
    pub fn advance(&self, delta_ms: i64) -> i64 {
        self.now_epoch_ms.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_epoch_ms(&self) -> i64 {
        self.now_epoch_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock, SystemClock};

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.advance(250), 1_250);
        assert_eq!(clock.now_epoch_ms(), 1_250);
        clock.set(5);
        assert_eq!(clock.now_epoch_ms(), 5);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_epoch_ms() > 1_577_836_800_000);
    }
}
