//! Per-identifier failed attempt tracking.

/// Failed login attempts recorded for one identifier.
///
/// `window_reset_at` is the end of the counting window while the entry is
/// below the threshold, and the end of the block period once it reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Failed attempts in the current window
    pub count: u32,
    /// When the window (or block) ends, epoch milliseconds
    pub window_reset_at: u64,
    /// When the most recent failure was recorded, epoch milliseconds
    pub last_attempt_at: u64,
}

impl RateLimitEntry {
    /// Start a new window with a single failure.
    pub fn first(now: u64, window_ms: u64) -> Self {
        Self {
            count: 1,
            window_reset_at: now.saturating_add(window_ms),
            last_attempt_at: now,
        }
    }

    /// Whether the window or block has elapsed.
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.window_reset_at
    }

    /// Whether the entry has reached the threshold and is still active.
    pub fn is_blocked(&self, now: u64, max_attempts: u32) -> bool {
        self.count >= max_attempts && !self.is_expired(now)
    }

    /// Milliseconds left until the window or block ends.
    pub fn millis_until_reset(&self, now: u64) -> u64 {
        self.window_reset_at.saturating_sub(now)
    }
}
