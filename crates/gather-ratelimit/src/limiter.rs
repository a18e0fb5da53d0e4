use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use gather_coord::{CoordinationStore, RateWindow, keys};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{ProviderLimits, RateLimitConfig};
use crate::error::RateLimitError;

/// Extra lifetime on a window key past its window so idle scopes expire.
pub const WINDOW_TTL_BUFFER: Duration = Duration::from_secs(60);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Sliding-window admission control over the shared coordination store.
///
/// Two APIs share the same atomic primitive:
/// - structured `(arena, provider, suffix)` scopes with cascading
///   minute/hour/day windows resolved from [`ProviderLimits`];
/// - explicit keys with a single `(max_calls, window)` limit.
pub struct RateLimiter {
    store: Arc<dyn CoordinationStore>,
    limits: ArcSwap<ProviderLimits>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let limits = self.limits.load();
        f.debug_struct("RateLimiter")
            .field("provider_count", &limits.providers.len())
            .field("default", &limits.default)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self::with_limits(store, ProviderLimits::builtin())
    }

    pub fn with_limits(store: Arc<dyn CoordinationStore>, limits: ProviderLimits) -> Self {
        Self {
            store,
            limits: ArcSwap::new(Arc::new(limits)),
        }
    }

    pub fn limits(&self) -> Arc<ProviderLimits> {
        self.limits.load_full()
    }

    pub fn replace_provider_limits(&self, limits: ProviderLimits) {
        self.limits.store(Arc::new(limits));
    }

    pub fn effective_config(
        &self,
        provider: &str,
        config: Option<&RateLimitConfig>,
    ) -> RateLimitConfig {
        self.limits.load().resolve(provider, config)
    }

    /// Records one call against every configured window of the scope, or none.
    ///
    /// One token is shared across the windows of this call. When a window
    /// rejects, windows already admitted have the token removed again. The
    /// rollback is not atomic with the inserts it undoes, so a concurrent
    /// caller can briefly see those slots as taken.
    pub async fn check_and_acquire(
        &self,
        arena: &str,
        provider: &str,
        key_suffix: &str,
        config: Option<&RateLimitConfig>,
    ) -> bool {
        let config = self.effective_config(provider, config);
        let token = Uuid::new_v4().to_string();
        let now = now_ms();
        let mut admitted: Vec<String> = Vec::new();

        for (window, limit) in config.windows() {
            let key = keys::rate_window(arena, provider, key_suffix, window);
            match self
                .store
                .window_acquire(
                    &key,
                    now,
                    window.duration(),
                    limit,
                    &token,
                    window.duration() + WINDOW_TTL_BUFFER,
                )
                .await
            {
                Ok(true) => admitted.push(key),
                Ok(false) => {
                    debug!(
                        event = "ratelimit.rejected",
                        arena = %arena,
                        provider = %provider,
                        suffix = %key_suffix,
                        window = %window,
                        limit = limit
                    );
                    self.rollback(&admitted, &token).await;
                    return false;
                }
                Err(err) => {
                    warn!(
                        event = "ratelimit.fail_open",
                        key = %key,
                        error = %err
                    );
                    return true;
                }
            }
        }
        true
    }

    async fn rollback(&self, keys: &[String], token: &str) {
        for key in keys {
            if let Err(err) = self.store.window_remove(key, token).await {
                warn!(event = "ratelimit.rollback_failed", key = %key, error = %err);
            }
        }
    }

    /// Whether any window of the scope is full. Records nothing.
    pub async fn is_rate_limited(
        &self,
        arena: &str,
        provider: &str,
        key_suffix: &str,
        config: Option<&RateLimitConfig>,
    ) -> bool {
        let config = self.effective_config(provider, config);
        let now = now_ms();
        for (window, limit) in config.windows() {
            let key = keys::rate_window(arena, provider, key_suffix, window);
            match self.store.window_count(&key, now, window.duration()).await {
                Ok(count) if count >= limit => return true,
                Ok(_) => {}
                Err(err) => {
                    warn!(event = "ratelimit.fail_open", key = %key, error = %err);
                    return false;
                }
            }
        }
        false
    }

    /// Time until every full window of the scope frees a slot; zero when none is full.
    pub async fn get_wait_time(
        &self,
        arena: &str,
        provider: &str,
        key_suffix: &str,
        config: Option<&RateLimitConfig>,
    ) -> Duration {
        let config = self.effective_config(provider, config);
        let now = now_ms();
        let mut wait = Duration::ZERO;
        for (window, limit) in config.windows() {
            let key = keys::rate_window(arena, provider, key_suffix, window);
            match self.window_wait(&key, now, window.duration(), limit).await {
                Ok(window_wait) => wait = wait.max(window_wait),
                Err(err) => {
                    warn!(event = "ratelimit.fail_open", key = %key, error = %err);
                    return Duration::ZERO;
                }
            }
        }
        wait
    }

    async fn window_wait(
        &self,
        key: &str,
        now: i64,
        window: Duration,
        limit: u64,
    ) -> Result<Duration, RateLimitError> {
        let count = self.store.window_count(key, now, window).await?;
        if count < limit {
            return Ok(Duration::ZERO);
        }
        let Some(oldest) = self.store.window_oldest(key, now, window).await? else {
            return Ok(Duration::ZERO);
        };
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        let remaining_ms = oldest.saturating_add(window_ms).saturating_sub(now);
        let remaining = Duration::from_millis(u64::try_from(remaining_ms).unwrap_or(0));
        Ok(remaining.min(window))
    }

    /// Explicit-key variant: records one call against `key` if fewer than
    /// `max_calls` were recorded in the trailing `window`.
    pub async fn acquire(&self, key: &str, max_calls: u64, window: Duration) -> bool {
        let token = Uuid::new_v4().to_string();
        match self
            .store
            .window_acquire(
                key,
                now_ms(),
                window,
                max_calls,
                &token,
                window + WINDOW_TTL_BUFFER,
            )
            .await
        {
            Ok(admitted) => admitted,
            Err(err) => {
                warn!(event = "ratelimit.fail_open", key = %key, error = %err);
                true
            }
        }
    }

    /// Polls [`acquire`](Self::acquire) until a slot opens or `timeout`
    /// (default 60s) elapses. The deadline is hard: expiry is an error, never
    /// a partial success.
    pub async fn wait_for_slot(
        &self,
        key: &str,
        max_calls: u64,
        window: Duration,
        timeout: Option<Duration>,
    ) -> Result<(), RateLimitError> {
        let budget = timeout.unwrap_or(DEFAULT_WAIT_TIMEOUT);
        let started = Instant::now();
        let deadline = started + budget;
        let interval = poll_interval(max_calls, window);

        loop {
            if self.acquire(key, max_calls, window).await {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(event = "ratelimit.wait_timeout", key = %key, budget_ms = budget.as_millis() as u64);
                return Err(RateLimitError::Timeout {
                    key: key.to_string(),
                    waited: now.saturating_duration_since(started),
                });
            }
            sleep(interval.min(deadline - now)).await;
        }
    }

    /// Administrative: drops every window of the scope.
    pub async fn reset(
        &self,
        arena: &str,
        provider: &str,
        key_suffix: &str,
    ) -> Result<u64, RateLimitError> {
        let keys: Vec<String> = RateWindow::ALL
            .iter()
            .map(|window| keys::rate_window(arena, provider, key_suffix, *window))
            .collect();
        let removed = self.store.delete(&keys).await?;
        debug!(
            event = "ratelimit.reset",
            arena = %arena,
            provider = %provider,
            suffix = %key_suffix,
            removed = removed
        );
        Ok(removed)
    }
}

fn poll_interval(max_calls: u64, window: Duration) -> Duration {
    let per_call = window
        .checked_div(u32::try_from(max_calls.max(1)).unwrap_or(u32::MAX))
        .unwrap_or(window);
    per_call.min(MAX_POLL_INTERVAL)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_is_window_share_capped_at_five_seconds() {
        assert_eq!(
            poll_interval(2, Duration::from_secs(60)),
            Duration::from_secs(5)
        );
        assert_eq!(
            poll_interval(10, Duration::from_secs(10)),
            Duration::from_secs(1)
        );
        assert_eq!(
            poll_interval(0, Duration::from_secs(2)),
            Duration::from_secs(2)
        );
    }
}
