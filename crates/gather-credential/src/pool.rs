use std::sync::Arc;
use std::time::Duration;

use gather_common::{AcquireError, ErrorKind};
use gather_coord::{CoordinationStore, QuotaWindow, StoreError, keys};
use gather_storage::{CredentialRecord, CredentialStore, StorageError};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::crypto::Encryptor;
use crate::env::{EnvFallback, EnvLookup, process_env};
use crate::lease::{CooldownStatus, ErrorOutcome, Exclusion, LeasedCredential, QuotaUsage};
use crate::quota::until_window_end;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub lease_ttl: Duration,
    pub base_cooldown: Duration,
    pub max_cooldown: Duration,
    /// Consecutive errors that trip the breaker.
    pub breaker_threshold: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_secs(3600),
            base_cooldown: Duration::from_secs(60),
            max_cooldown: Duration::from_secs(3600),
            breaker_threshold: 5,
        }
    }
}

impl PoolSettings {
    /// `base * 2^(n-1)` capped at the maximum; the maximum once tripped.
    pub fn cooldown_for(&self, error_count: u32) -> Duration {
        if error_count >= self.breaker_threshold {
            return self.max_cooldown;
        }
        let factor = 1u32
            .checked_shl(error_count.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_cooldown
            .saturating_mul(factor)
            .min(self.max_cooldown)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("not a durable credential id: {0}")]
    NotDurable(String),
}

/// Hands out provider credentials to collector tasks.
///
/// Durable credentials rotate least-recently-used first and are gated by the
/// cooldown marker and both quota counters in the coordination store. Only
/// running out of every candidate, env keys included, reaches the caller.
pub struct CredentialPool {
    store: Arc<dyn CoordinationStore>,
    credentials: Arc<dyn CredentialStore>,
    encryptor: Encryptor,
    env: EnvFallback,
    settings: PoolSettings,
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CredentialPool {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        credentials: Arc<dyn CredentialStore>,
        encryptor: Encryptor,
    ) -> Self {
        Self {
            store,
            credentials,
            encryptor,
            env: EnvFallback::new(process_env()),
            settings: PoolSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PoolSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_env_lookup(mut self, lookup: EnvLookup) -> Self {
        self.env = EnvFallback::new(lookup);
        self
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Picks a usable credential for `(platform, tier)`. Never waits.
    ///
    /// Without a `task_id` a fresh one is generated for the lease; it is
    /// returned on the credential so the caller can release precisely.
    pub async fn acquire(
        &self,
        platform: &str,
        tier: &str,
        task_id: Option<&str>,
    ) -> Result<LeasedCredential, AcquireError> {
        match self.credentials.list_active(platform, tier).await {
            Ok(records) => {
                for record in &records {
                    if let Some(leased) = self.try_durable(record, task_id).await {
                        return Ok(leased);
                    }
                }
            }
            Err(err) => {
                warn!(
                    event = "credential.list_failed",
                    platform = %platform,
                    tier = %tier,
                    error = %err
                );
            }
        }

        if let Some(leased) = self
            .env
            .acquire(platform, tier, self.settings.breaker_threshold)
            .await
        {
            return Ok(leased);
        }

        info!(event = "credential.unavailable", platform = %platform, tier = %tier);
        Err(AcquireError::unavailable(platform, tier))
    }

    async fn try_durable(
        &self,
        record: &CredentialRecord,
        task_id: Option<&str>,
    ) -> Option<LeasedCredential> {
        let id = record.id.to_string();

        match self.store.exists(&keys::cooldown(&id)).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(event = "credential.cooling", credential_id = %id);
                return None;
            }
            Err(err) => {
                warn!(event = "credential.store_unavailable", credential_id = %id, error = %err);
                return None;
            }
        }

        for (window, cap) in [
            (QuotaWindow::Daily, record.daily_quota),
            (QuotaWindow::Monthly, record.monthly_quota),
        ] {
            let Some(cap) = cap else {
                continue;
            };
            match self.store.get_int(&keys::quota(&id, window)).await {
                Ok(used) if used.unwrap_or(0) >= cap => {
                    debug!(
                        event = "credential.quota_exhausted",
                        credential_id = %id,
                        window = %window,
                        cap = cap
                    );
                    return None;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(event = "credential.store_unavailable", credential_id = %id, error = %err);
                    return None;
                }
            }
        }

        let fields = match self.encryptor.decrypt_payload(&record.encrypted_payload) {
            Ok(fields) => fields,
            Err(err) => {
                warn!(event = "credential.decrypt_failed", credential_id = %id, error = %err);
                return None;
            }
        };

        if !self.claim_quota(record, &id).await {
            return None;
        }

        let task_id = task_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.record_usage(record, &id, &task_id).await;

        debug!(
            event = "credential.acquired",
            credential_id = %id,
            platform = %record.platform,
            tier = %record.tier,
            task = %task_id
        );
        Some(LeasedCredential::new(
            id,
            &record.platform,
            &record.tier,
            Some(task_id),
            fields,
        ))
    }

    /// Increments both quota counters. Another worker may have passed the
    /// read check concurrently, so a count past the cap refuses the candidate.
    /// Counter write failures are logged and do not refuse it.
    async fn claim_quota(&self, record: &CredentialRecord, id: &str) -> bool {
        let now = OffsetDateTime::now_utc();
        let mut within_caps = true;
        for (window, cap) in [
            (QuotaWindow::Daily, record.daily_quota),
            (QuotaWindow::Monthly, record.monthly_quota),
        ] {
            let ttl = until_window_end(window, now);
            match self
                .store
                .incr_with_expiry(&keys::quota(id, window), ttl)
                .await
            {
                Ok(used) => {
                    if let Some(cap) = cap
                        && used > cap
                    {
                        debug!(
                            event = "credential.quota_overrun",
                            credential_id = %id,
                            window = %window,
                            cap = cap,
                            used = used
                        );
                        within_caps = false;
                    }
                }
                Err(err) => {
                    warn!(
                        event = "credential.quota_incr_failed",
                        credential_id = %id,
                        window = %window,
                        error = %err
                    );
                }
            }
        }
        within_caps
    }

    /// Lease and `last_used_at`. Best-effort once the candidate has qualified.
    async fn record_usage(&self, record: &CredentialRecord, id: &str, task_id: &str) {
        if let Err(err) = self
            .store
            .set_ex(
                &keys::lease(id, task_id),
                &record.platform,
                self.settings.lease_ttl,
            )
            .await
        {
            warn!(event = "credential.lease_failed", credential_id = %id, error = %err);
        }

        let now = OffsetDateTime::now_utc();
        if let Err(err) = self.credentials.touch_last_used(record.id, now).await {
            warn!(event = "credential.touch_failed", credential_id = %id, error = %err);
        }
    }

    /// Drops the lease for `task_id`, or every lease of the credential.
    /// Advisory: failures are logged only.
    pub async fn release(&self, credential_id: &str, task_id: Option<&str>) {
        let credential_id = &canonical_id(credential_id);
        let lease_keys = match task_id {
            Some(task_id) => vec![keys::lease(credential_id, task_id)],
            None => match self.store.scan_prefix(&keys::lease_prefix(credential_id)).await {
                Ok(found) => found,
                Err(err) => {
                    warn!(event = "credential.release_failed", credential_id = %credential_id, error = %err);
                    return;
                }
            },
        };
        if lease_keys.is_empty() {
            return;
        }
        match self.store.delete(&lease_keys).await {
            Ok(removed) => {
                debug!(event = "credential.released", credential_id = %credential_id, removed = removed);
            }
            Err(err) => {
                warn!(event = "credential.release_failed", credential_id = %credential_id, error = %err);
            }
        }
    }

    /// Records a failed outbound call classified by the caller. Never fails.
    pub async fn report_error(&self, credential_id: &str, kind: ErrorKind) -> ErrorOutcome {
        let Ok(id) = Uuid::parse_str(credential_id) else {
            return self
                .env
                .report_error(credential_id, kind, self.settings.breaker_threshold)
                .await;
        };

        let current = match self.credentials.error_count(id).await {
            Ok(count) => count.unwrap_or(0),
            Err(err) => {
                warn!(event = "credential.error_count_read_failed", credential_id = %id, error = %err);
                0
            }
        };
        let error_count = u32::try_from(current).unwrap_or(0).saturating_add(1);
        let tripped = error_count >= self.settings.breaker_threshold;
        let cooldown = self.settings.cooldown_for(error_count);

        if let Err(err) = self
            .store
            .set_ex(
                &keys::cooldown(&id.to_string()),
                &error_count.to_string(),
                cooldown,
            )
            .await
        {
            warn!(event = "credential.cooldown_write_failed", credential_id = %id, error = %err);
        }
        let stored_count = i32::try_from(error_count).unwrap_or(i32::MAX);
        if let Err(err) = self
            .credentials
            .record_error(id, stored_count, OffsetDateTime::now_utc())
            .await
        {
            warn!(event = "credential.error_persist_failed", credential_id = %id, error = %err);
        }

        if tripped {
            warn!(
                event = "credential.circuit_open",
                credential_id = %id,
                kind = %kind,
                error_count = error_count,
                cooldown_secs = cooldown.as_secs()
            );
        } else {
            warn!(
                event = "credential.cooldown",
                credential_id = %id,
                kind = %kind,
                error_count = error_count,
                cooldown_secs = cooldown.as_secs()
            );
        }

        ErrorOutcome {
            error_count,
            exclusion: Exclusion::For(cooldown),
            tripped,
        }
    }

    /// Administrative breaker reset: zeroes the durable error count and drops
    /// the cooldown marker.
    pub async fn reset_errors(&self, credential_id: Uuid) -> Result<(), PoolError> {
        self.credentials.reset_errors(credential_id).await?;
        let id = credential_id.to_string();
        self.store.delete(&[keys::cooldown(&id)]).await?;
        info!(event = "credential.reset", credential_id = %id);
        Ok(())
    }

    /// Clears the in-process counter and cooldown of an env credential.
    pub async fn reset_env_credential(&self, name: &str) -> bool {
        let had_state = self.env.reset(name).await;
        info!(event = "credential.env_reset", credential_id = %name, had_state = had_state);
        had_state
    }

    pub async fn lease_exists(&self, credential_id: &str, task_id: &str) -> Result<bool, PoolError> {
        let credential_id = canonical_id(credential_id);
        Ok(self.store.exists(&keys::lease(&credential_id, task_id)).await?)
    }

    pub async fn quota_usage(&self, credential_id: &str) -> Result<QuotaUsage, PoolError> {
        let credential_id = &canonical_id(credential_id);
        let daily = self
            .store
            .get_int(&keys::quota(credential_id, QuotaWindow::Daily))
            .await?;
        let monthly = self
            .store
            .get_int(&keys::quota(credential_id, QuotaWindow::Monthly))
            .await?;
        Ok(QuotaUsage {
            daily: daily.unwrap_or(0),
            monthly: monthly.unwrap_or(0),
        })
    }

    /// The live cooldown marker, if any.
    pub async fn cooldown_status(
        &self,
        credential_id: &str,
    ) -> Result<Option<CooldownStatus>, PoolError> {
        let key = keys::cooldown(&canonical_id(credential_id));
        let Some(error_count) = self.store.get_int(&key).await? else {
            return Ok(None);
        };
        let remaining = self.store.ttl(&key).await?;
        Ok(Some(CooldownStatus {
            error_count,
            remaining,
        }))
    }

    /// Durable record lookup for operators.
    pub async fn record(&self, credential_id: &str) -> Result<Option<CredentialRecord>, PoolError> {
        let id = Uuid::parse_str(credential_id)
            .map_err(|_| PoolError::NotDurable(credential_id.to_string()))?;
        Ok(self.credentials.get(id).await?)
    }
}

/// Coordination keys always use the hyphenated lowercase form of a durable
/// id, whatever form the caller passed. Env names are kept as they are.
fn canonical_id(credential_id: &str) -> String {
    match Uuid::parse_str(credential_id) {
        Ok(id) => id.to_string(),
        Err(_) => credential_id.to_string(),
    }
}
