//! Shared coordination store for credential leases, quota counters, cooldown
//! markers and rate-limit windows.
//!
//! Everything kept here is ephemeral and TTL-bearing: losing the store must
//! never corrupt credential identity, only degrade callers to their fallback
//! paths. The storage technology is substitutable; the contract is the
//! [`CoordinationStore`] trait (atomic sliding-window admission plus TTL expiry).

pub mod keys;
mod memory;
mod redis_store;
mod store;

pub use keys::{QuotaWindow, RateWindow};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{CoordinationStore, StoreError, StoreResult};
