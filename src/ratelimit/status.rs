//! Outcomes reported by the rate limiter.

use std::time::Duration;

/// Header carrying the configured attempt limit.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// Header carrying the attempts left in the window.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// Header carrying the window or block end, epoch seconds.
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
/// Header carrying the seconds to wait before retrying.
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// Result of checking an identifier against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Whether the identifier is currently blocked
    pub is_limited: bool,
    /// Failed attempts left before blocking
    pub remaining: u32,
    /// The configured maximum number of attempts
    pub limit: u32,
    /// When the window or block ends, epoch milliseconds
    pub reset_time_ms: u64,
    /// Seconds until the block ends, only set when limited
    pub retry_after_secs: Option<u64>,
}

impl RateLimitStatus {
    /// Reset time rounded up to whole epoch seconds.
    pub fn reset_time_secs(&self) -> u64 {
        self.reset_time_ms.div_ceil(1000)
    }

    /// HTTP headers describing this status.
    ///
    /// `Retry-After` is only included when the identifier is limited.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RESET, self.reset_time_secs().to_string()),
        ];
        if let Some(retry_after) = self.retry_after_secs {
            headers.push((HEADER_RETRY_AFTER, retry_after.to_string()));
        }
        headers
    }
}

/// What the authentication handler should do with an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Verify the credentials now.
    Allowed(RateLimitStatus),
    /// Wait for `delay`, then verify the credentials.
    Delayed {
        delay: Duration,
        status: RateLimitStatus,
    },
    /// Reject without verifying.
    Blocked {
        retry_after: Duration,
        status: RateLimitStatus,
    },
}

impl Decision {
    /// The status the decision was derived from.
    pub fn status(&self) -> &RateLimitStatus {
        match self {
            Decision::Allowed(status) => status,
            Decision::Delayed { status, .. } => status,
            Decision::Blocked { status, .. } => status,
        }
    }

    /// Whether the attempt must be rejected.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Decision::Blocked { .. })
    }

    /// Wait the caller should apply before verifying, zero when none.
    pub fn delay(&self) -> Duration {
        match self {
            Decision::Delayed { delay, .. } => *delay,
            _ => Duration::ZERO,
        }
    }
}

/// Snapshot of limiter state for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    /// Entries held in the store, including expired ones not yet swept
    pub total_tracked: usize,
    /// Entries currently blocking their identifier
    pub blocked_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(is_limited: bool, retry_after_secs: Option<u64>) -> RateLimitStatus {
        RateLimitStatus {
            is_limited,
            remaining: if is_limited { 0 } else { 3 },
            limit: 5,
            reset_time_ms: 1_700_000_000_001,
            retry_after_secs,
        }
    }

    #[test]
    fn test_headers_when_allowed() {
        let headers = status(false, None).headers();
        assert_eq!(
            headers,
            vec![
                (HEADER_LIMIT, "5".to_string()),
                (HEADER_REMAINING, "3".to_string()),
                (HEADER_RESET, "1700000001".to_string()),
            ]
        );
    }

    #[test]
    fn test_headers_when_limited_include_retry_after() {
        let headers = status(true, Some(1800)).headers();
        assert_eq!(headers.len(), 4);
        assert_eq!(headers[1], (HEADER_REMAINING, "0".to_string()));
        assert_eq!(headers[3], (HEADER_RETRY_AFTER, "1800".to_string()));
    }

    #[test]
    fn test_decision_accessors() {
        let allowed = Decision::Allowed(status(false, None));
        assert!(!allowed.is_blocked());
        assert_eq!(allowed.delay(), Duration::ZERO);

        let delayed = Decision::Delayed {
            delay: Duration::from_secs(2),
            status: status(false, None),
        };
        assert_eq!(delayed.delay(), Duration::from_secs(2));
        assert_eq!(delayed.status().remaining, 3);

        let blocked = Decision::Blocked {
            retry_after: Duration::from_secs(60),
            status: status(true, Some(60)),
        };
        assert!(blocked.is_blocked());
        assert_eq!(blocked.delay(), Duration::ZERO);
    }
}
