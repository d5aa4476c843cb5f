//! Login attempt rate limiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::entry::RateLimitEntry;
use super::status::{Decision, LimiterStats, RateLimitStatus};
use super::store::AttemptStore;

/// Default number of failures allowed per window.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default counting window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
/// Default lockout once the threshold is reached.
pub const DEFAULT_BLOCK_DURATION: Duration = Duration::from_secs(30 * 60);

/// Delay applied after the first failure.
const BASE_DELAY_MS: u64 = 1_000;
/// Upper bound on the progressive delay.
const MAX_DELAY_MS: u64 = 10_000;

/// Lockout policy applied to every identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Failures allowed within a window before blocking
    pub max_attempts: u32,
    /// Length of the counting window
    pub window: Duration,
    /// Length of the lockout once `max_attempts` is reached
    pub block_duration: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window: DEFAULT_WINDOW,
            block_duration: DEFAULT_BLOCK_DURATION,
        }
    }
}

impl RateLimitPolicy {
    fn window_ms(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }

    fn block_ms(&self) -> u64 {
        u64::try_from(self.block_duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Tracks failed login attempts per identifier and enforces lockouts.
///
/// An identifier moves from absent, to counting failures, to blocked once
/// `max_attempts` is reached, and back to absent when its window or block
/// elapses or it is reset. Expiry is applied lazily on access and eagerly by
/// [`LoginRateLimiter::cleanup`].
///
/// This struct is thread-safe and is meant to be shared behind an `Arc`.
pub struct LoginRateLimiter {
    policy: RateLimitPolicy,
    store: AttemptStore,
    clock: Arc<dyn Clock>,
}

impl LoginRateLimiter {
    /// Create a rate limiter using the system clock.
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Create a rate limiter reading time from `clock`.
    pub fn with_clock(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            store: AttemptStore::new(),
            clock,
        }
    }

    /// Check whether an identifier may attempt to authenticate.
    ///
    /// Read-only apart from dropping an expired entry. For identifiers with no
    /// active entry, the reported reset time is where a window starting now
    /// would end; no entry is created.
    pub fn check(&self, identifier: &str) -> RateLimitStatus {
        let now = self.clock.now_ms();
        self.store
            .with_entries(|entries| self.status_of(entries, identifier, now))
    }

    /// Record a failed authentication attempt.
    pub fn record_attempt(&self, identifier: &str) {
        let now = self.clock.now_ms();
        let max_attempts = self.policy.max_attempts;

        let window_ms = self.policy.window_ms();
        let block_ms = self.policy.block_ms();

        let blocked = self.store.with_entries(|entries| {
            let mut escalate = false;
            let entry = entries
                .entry(identifier.to_string())
                .and_modify(|entry| {
                    if entry.is_expired(now) {
                        *entry = RateLimitEntry::first(now, window_ms);
                    } else {
                        entry.count = entry.count.saturating_add(1);
                        entry.last_attempt_at = now;
                        escalate = entry.count >= max_attempts;
                    }
                })
                .or_insert_with(|| RateLimitEntry::first(now, window_ms));

            // Only an active entry reaching the threshold switches to a block
            // period. A fresh entry always starts with the counting window.
            if escalate {
                entry.window_reset_at = now.saturating_add(block_ms);
                Some(*entry)
            } else {
                None
            }
        });

        if let Some(entry) = blocked {
            debug!(
                identifier = %identifier,
                count = entry.count,
                blocked_until = entry.window_reset_at,
                "Identifier blocked"
            );
        }
    }

    /// Forget every failure recorded for an identifier.
    pub fn reset(&self, identifier: &str) {
        self.store.remove(identifier);
    }

    /// Suggested wait before evaluating the next attempt.
    ///
    /// Doubles from one second per recorded failure and caps at ten seconds.
    /// Zero when the identifier has no active entry.
    pub fn progressive_delay(&self, identifier: &str) -> Duration {
        let now = self.clock.now_ms();
        match self.store.get(identifier) {
            Some(entry) if !entry.is_expired(now) => backoff(entry.count),
            _ => Duration::ZERO,
        }
    }

    /// Decide how to treat an incoming attempt, in one critical section.
    pub fn evaluate(&self, identifier: &str) -> Decision {
        let now = self.clock.now_ms();
        self.store.with_entries(|entries| {
            let status = self.status_of(entries, identifier, now);
            if let Some(secs) = status.retry_after_secs {
                return Decision::Blocked {
                    retry_after: Duration::from_secs(secs),
                    status,
                };
            }

            match entries.get(identifier) {
                Some(entry) => Decision::Delayed {
                    delay: backoff(entry.count),
                    status,
                },
                None => Decision::Allowed(status),
            }
        })
    }

    /// Counts of tracked and currently blocked identifiers.
    pub fn stats(&self) -> LimiterStats {
        let now = self.clock.now_ms();
        let max_attempts = self.policy.max_attempts;
        self.store.with_entries(|entries| LimiterStats {
            total_tracked: entries.len(),
            blocked_count: entries
                .values()
                .filter(|entry| entry.is_blocked(now, max_attempts))
                .count(),
        })
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn cleanup(&self) -> usize {
        self.store.remove_expired(self.clock.now_ms())
    }

    /// Raw failure count stored for an identifier, expired or not.
    pub fn attempt_count(&self, identifier: &str) -> Option<u32> {
        self.store.get(identifier).map(|entry| entry.count)
    }

    /// Number of entries held, including expired ones not yet swept.
    pub fn tracked_count(&self) -> usize {
        self.store.len()
    }

    /// Forget every identifier.
    pub fn clear(&self) {
        self.store.clear();
    }

    fn status_of(
        &self,
        entries: &mut HashMap<String, RateLimitEntry>,
        identifier: &str,
        now: u64,
    ) -> RateLimitStatus {
        let max_attempts = self.policy.max_attempts;

        let entry = match entries.get(identifier).copied() {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(identifier);
                None
            }
            other => other,
        };

        match entry {
            None => RateLimitStatus {
                is_limited: false,
                remaining: max_attempts,
                limit: max_attempts,
                reset_time_ms: now.saturating_add(self.policy.window_ms()),
                retry_after_secs: None,
            },
            Some(entry) if entry.count >= max_attempts => RateLimitStatus {
                is_limited: true,
                remaining: 0,
                limit: max_attempts,
                reset_time_ms: entry.window_reset_at,
                retry_after_secs: Some(entry.millis_until_reset(now).div_ceil(1000)),
            },
            Some(entry) => RateLimitStatus {
                is_limited: false,
                remaining: max_attempts - entry.count,
                limit: max_attempts,
                reset_time_ms: entry.window_reset_at,
                retry_after_secs: None,
            },
        }
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}

/// Exponential backoff for the given failure count.
fn backoff(count: u32) -> Duration {
    let exponent = count.saturating_sub(1).min(32);
    let delay = BASE_DELAY_MS.saturating_mul(1u64 << exponent).min(MAX_DELAY_MS);
    Duration::from_millis(delay)
}
