//! Distributed sliding-window rate limiting.
//!
//! The limiter itself is stateless: every window lives in the shared
//! [`CoordinationStore`](gather_coord::CoordinationStore) as a sorted set of
//! per-call tokens scored by request time, and admission is a single atomic
//! prune/check/insert round trip. Store failures fail open.

mod config;
mod error;
mod limiter;

pub use config::{GLOBAL_DEFAULT_PER_MINUTE, ProviderLimits, RateLimitConfig};
pub use error::RateLimitError;
pub use limiter::{DEFAULT_WAIT_TIMEOUT, MAX_POLL_INTERVAL, RateLimiter, WINDOW_TTL_BUFFER};
