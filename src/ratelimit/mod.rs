//! Login rate limiting logic and state management.

mod clock;
mod entry;
mod limiter;
mod status;
mod store;
mod sweep;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::RateLimitEntry;
pub use limiter::{
    LoginRateLimiter, RateLimitPolicy, DEFAULT_BLOCK_DURATION, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_WINDOW,
};
pub use status::{
    Decision, LimiterStats, RateLimitStatus, HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET,
    HEADER_RETRY_AFTER,
};
pub use store::AttemptStore;
pub use sweep::{Sweeper, SweeperHandle, DEFAULT_SWEEP_INTERVAL};
