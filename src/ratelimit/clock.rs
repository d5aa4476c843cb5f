//! Time sources for the rate limiter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // Clamp pre-epoch clocks to zero rather than wrap.
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// A clock that only moves when told to.
///
/// Useful for tests and for replaying attempt sequences deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Set the clock to an absolute instant.
    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn test_manual_clock_advance_and_set() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);

        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now_ms(), 3_000);

        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }
}
