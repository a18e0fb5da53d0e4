use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::store::{CoordinationStore, StoreError, StoreResult, window_cutoff};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    /// (score, member), kept sorted by score.
    Sorted(Vec<(i64, String)>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process coordination store for tests and single-process development.
///
/// Expiry follows the tokio clock, so paused-time tests can advance through
/// cooldowns. `set_unavailable(true)` makes every call fail like an
/// unreachable server.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Live keys, sorted. Test helper.
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let guard = self.entries.lock().await;
        let mut keys: Vec<String> = guard
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store disabled".to_string()));
        }
        Ok(())
    }
}

fn live<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn sorted_mut<'a>(entry: &'a mut Entry, key: &str) -> StoreResult<&'a mut Vec<(i64, String)>> {
    match &mut entry.value {
        Value::Sorted(members) => Ok(members),
        Value::Text(text) => Err(StoreError::InvalidValue {
            key: key.to_string(),
            value: text.clone(),
        }),
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.check()?;
        let mut guard = self.entries.lock().await;
        Ok(live(&mut guard, key, Instant::now()).is_some())
    }

    async fn get_int(&self, key: &str) -> StoreResult<Option<i64>> {
        self.check()?;
        let mut guard = self.entries.lock().await;
        let Some(entry) = live(&mut guard, key, Instant::now()) else {
            return Ok(None);
        };
        match &entry.value {
            Value::Text(text) => text
                .parse::<i64>()
                .map(Some)
                .map_err(|_| StoreError::InvalidValue {
                    key: key.to_string(),
                    value: text.clone(),
                }),
            Value::Sorted(_) => Err(StoreError::InvalidValue {
                key: key.to_string(),
                value: "<sorted set>".to_string(),
            }),
        }
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        self.check()?;
        let now = Instant::now();
        let mut guard = self.entries.lock().await;
        Ok(live(&mut guard, key, now)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.check()?;
        let mut guard = self.entries.lock().await;
        guard.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        self.check()?;
        let now = Instant::now();
        let mut guard = self.entries.lock().await;
        if let Some(entry) = live(&mut guard, key, now) {
            let current = match &entry.value {
                Value::Text(text) => {
                    text.parse::<i64>()
                        .map_err(|_| StoreError::InvalidValue {
                            key: key.to_string(),
                            value: text.clone(),
                        })?
                }
                Value::Sorted(_) => {
                    return Err(StoreError::InvalidValue {
                        key: key.to_string(),
                        value: "<sorted set>".to_string(),
                    });
                }
            };
            let next = current + 1;
            entry.value = Value::Text(next.to_string());
            return Ok(next);
        }
        guard.insert(
            key.to_string(),
            Entry {
                value: Value::Text("1".to_string()),
                expires_at: Some(now + ttl),
            },
        );
        Ok(1)
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<u64> {
        self.check()?;
        let now = Instant::now();
        let mut guard = self.entries.lock().await;
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = guard.remove(key)
                && entry.is_live(now)
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check()?;
        let now = Instant::now();
        let guard = self.entries.lock().await;
        let mut keys: Vec<String> = guard
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn window_acquire(
        &self,
        key: &str,
        now_ms: i64,
        window: Duration,
        limit: u64,
        token: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        self.check()?;
        let now = Instant::now();
        let cutoff = window_cutoff(now_ms, window);
        let mut guard = self.entries.lock().await;
        if live(&mut guard, key, now).is_none() {
            guard.insert(
                key.to_string(),
                Entry {
                    value: Value::Sorted(Vec::new()),
                    expires_at: Some(now + ttl),
                },
            );
        }
        let Some(entry) = guard.get_mut(key) else {
            return Ok(false);
        };
        let members = sorted_mut(entry, key)?;
        members.retain(|(score, _)| *score > cutoff);
        if (members.len() as u64) >= limit {
            return Ok(false);
        }
        members.retain(|(_, member)| member != token);
        let at = members.partition_point(|(score, _)| *score <= now_ms);
        members.insert(at, (now_ms, token.to_string()));
        entry.expires_at = Some(now + ttl);
        Ok(true)
    }

    async fn window_count(&self, key: &str, now_ms: i64, window: Duration) -> StoreResult<u64> {
        self.check()?;
        let cutoff = window_cutoff(now_ms, window);
        let mut guard = self.entries.lock().await;
        let Some(entry) = live(&mut guard, key, Instant::now()) else {
            return Ok(0);
        };
        let members = sorted_mut(entry, key)?;
        Ok(members.iter().filter(|(score, _)| *score > cutoff).count() as u64)
    }

    async fn window_oldest(
        &self,
        key: &str,
        now_ms: i64,
        window: Duration,
    ) -> StoreResult<Option<i64>> {
        self.check()?;
        let cutoff = window_cutoff(now_ms, window);
        let mut guard = self.entries.lock().await;
        let Some(entry) = live(&mut guard, key, Instant::now()) else {
            return Ok(None);
        };
        let members = sorted_mut(entry, key)?;
        Ok(members
            .iter()
            .map(|(score, _)| *score)
            .find(|score| *score > cutoff))
    }

    async fn window_remove(&self, key: &str, token: &str) -> StoreResult<()> {
        self.check()?;
        let mut guard = self.entries.lock().await;
        if let Some(entry) = live(&mut guard, key, Instant::now()) {
            sorted_mut(entry, key)?.retain(|(_, member)| member != token);
        }
        Ok(())
    }
}
