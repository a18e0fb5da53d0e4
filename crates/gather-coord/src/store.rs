use std::time::Duration;

use async_trait::async_trait;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("coordination store unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected value at {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Atomic, TTL-capable key-value store shared by every worker process.
///
/// Sliding-window members are scored in unix milliseconds. A member belongs to
/// the window `(now_ms - window, now_ms]`; anything at or below the cutoff has
/// aged out.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    async fn get_int(&self, key: &str) -> StoreResult<Option<i64>>;

    /// Remaining time to live; `None` when the key is missing or never expires.
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Increments `key` and applies `ttl` only when this increment created it.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> StoreResult<i64>;

    async fn delete(&self, keys: &[String]) -> StoreResult<u64>;

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Prune, check and insert as one atomic unit. Returns whether `token` was
    /// admitted; a rejected call leaves the window untouched apart from pruning.
    async fn window_acquire(
        &self,
        key: &str,
        now_ms: i64,
        window: Duration,
        limit: u64,
        token: &str,
        ttl: Duration,
    ) -> StoreResult<bool>;

    /// Members currently inside the window. Read-only.
    async fn window_count(&self, key: &str, now_ms: i64, window: Duration) -> StoreResult<u64>;

    /// Score of the oldest member still inside the window. Read-only.
    async fn window_oldest(
        &self,
        key: &str,
        now_ms: i64,
        window: Duration,
    ) -> StoreResult<Option<i64>>;

    async fn window_remove(&self, key: &str, token: &str) -> StoreResult<()>;
}

pub(crate) fn window_cutoff(now_ms: i64, window: Duration) -> i64 {
    now_ms.saturating_sub(duration_ms(window))
}

pub(crate) fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
