use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::record::{CredentialRecord, NewCredential, sort_least_recently_used};
use crate::storage::{CredentialStore, StorageError, StorageResult};

/// In-process credential store for tests and local development.
///
/// Write attempts are counted even when `fail_writes` rejects them, so
/// best-effort callers can be checked for having tried.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    /// Insertion order stands in for `created_at`.
    rows: RwLock<Vec<CredentialRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_attempts: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> StorageResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> StorageResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> StorageResult<()>
    where
        F: FnOnce(&mut CredentialRecord),
    {
        self.check_write()?;
        let mut guard = self.rows.write().await;
        let row = guard
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(StorageError::NotFound(id))?;
        apply(row);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn list_active(
        &self,
        platform: &str,
        tier: &str,
    ) -> StorageResult<Vec<CredentialRecord>> {
        self.check_read()?;
        let guard = self.rows.read().await;
        let mut records: Vec<CredentialRecord> = guard
            .iter()
            .filter(|row| row.is_active && row.platform == platform && row.tier == tier)
            .cloned()
            .collect();
        sort_least_recently_used(&mut records);
        Ok(records)
    }

    async fn get(&self, id: Uuid) -> StorageResult<Option<CredentialRecord>> {
        self.check_read()?;
        Ok(self.rows.read().await.iter().find(|row| row.id == id).cloned())
    }

    async fn error_count(&self, id: Uuid) -> StorageResult<Option<i32>> {
        self.check_read()?;
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.error_count))
    }

    async fn touch_last_used(&self, id: Uuid, at: OffsetDateTime) -> StorageResult<()> {
        self.update(id, |row| row.last_used_at = Some(at)).await
    }

    async fn record_error(
        &self,
        id: Uuid,
        error_count: i32,
        at: OffsetDateTime,
    ) -> StorageResult<()> {
        self.update(id, |row| {
            row.error_count = error_count;
            row.last_error_at = Some(at);
        })
        .await
    }

    async fn reset_errors(&self, id: Uuid) -> StorageResult<()> {
        self.update(id, |row| {
            row.error_count = 0;
            row.last_error_at = None;
        })
        .await
    }

    async fn insert(&self, credential: NewCredential) -> StorageResult<Uuid> {
        self.check_write()?;
        let id = credential.id.unwrap_or_else(Uuid::new_v4);
        let record = CredentialRecord {
            id,
            platform: credential.platform,
            tier: credential.tier,
            encrypted_payload: credential.encrypted_payload,
            daily_quota: credential.daily_quota,
            monthly_quota: credential.monthly_quota,
            is_active: credential.is_active,
            error_count: 0,
            last_error_at: None,
            last_used_at: None,
        };
        let mut guard = self.rows.write().await;
        guard.retain(|row| row.id != id);
        guard.push(record);
        Ok(id)
    }
}
