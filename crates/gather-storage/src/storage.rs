#![allow(clippy::needless_update)]

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Schema,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db;
use crate::entities;
use crate::record::{CredentialRecord, NewCredential, sort_least_recently_used};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("db error: {0}")]
    Db(#[from] DbErr),
    #[error("credential not found: {0}")]
    NotFound(Uuid),
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Durable credential store consumed by the pool.
///
/// Reads are the hot path (`list_active`); writes are limited to usage and
/// error bookkeeping, plus admin inserts and resets.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Active credentials for `(platform, tier)`, least recently used first,
    /// never-used before any used one.
    async fn list_active(&self, platform: &str, tier: &str)
    -> StorageResult<Vec<CredentialRecord>>;

    async fn get(&self, id: Uuid) -> StorageResult<Option<CredentialRecord>>;

    async fn error_count(&self, id: Uuid) -> StorageResult<Option<i32>>;

    async fn touch_last_used(&self, id: Uuid, at: OffsetDateTime) -> StorageResult<()>;

    async fn record_error(&self, id: Uuid, error_count: i32, at: OffsetDateTime)
    -> StorageResult<()>;

    /// Administrative reset of the circuit breaker.
    async fn reset_errors(&self, id: Uuid) -> StorageResult<()>;

    async fn insert(&self, credential: NewCredential) -> StorageResult<Uuid>;
}

/// SeaORM-backed credential store (sqlite, postgres or mysql).
#[derive(Clone)]
pub struct CredentialStorage {
    db: DatabaseConnection,
}

impl std::fmt::Debug for CredentialStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStorage").finish_non_exhaustive()
    }
}

impl CredentialStorage {
    pub async fn connect(dsn: &str) -> Result<Self, DbErr> {
        let db = db::connect(dsn).await?;
        Ok(Self { db })
    }

    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Entity-first schema sync.
    pub async fn sync(&self) -> Result<(), DbErr> {
        use sea_orm::ConnectionTrait;

        Schema::new(self.db.get_database_backend())
            .builder()
            .register(entities::Credentials)
            .sync(&self.db)
            .await
    }

    pub async fn health(&self) -> Result<(), DbErr> {
        entities::Credentials::find()
            .order_by_asc(entities::credentials::Column::Id)
            .one(&self.db)
            .await?;
        Ok(())
    }
}

fn ensure_updated(id: Uuid, rows_affected: u64) -> StorageResult<()> {
    if rows_affected == 0 {
        return Err(StorageError::NotFound(id));
    }
    Ok(())
}

#[async_trait]
impl CredentialStore for CredentialStorage {
    async fn list_active(
        &self,
        platform: &str,
        tier: &str,
    ) -> StorageResult<Vec<CredentialRecord>> {
        use entities::credentials::Column;

        let rows = entities::Credentials::find()
            .filter(Column::Platform.eq(platform))
            .filter(Column::Tier.eq(tier))
            .filter(Column::IsActive.eq(true))
            .order_by_asc(Column::LastUsedAt)
            .order_by_asc(Column::CreatedAt)
            .all(&self.db)
            .await?;
        let mut records: Vec<CredentialRecord> =
            rows.into_iter().map(CredentialRecord::from).collect();
        sort_least_recently_used(&mut records);
        Ok(records)
    }

    async fn get(&self, id: Uuid) -> StorageResult<Option<CredentialRecord>> {
        let row = entities::Credentials::find_by_id(id).one(&self.db).await?;
        Ok(row.map(CredentialRecord::from))
    }

    async fn error_count(&self, id: Uuid) -> StorageResult<Option<i32>> {
        let row = entities::Credentials::find_by_id(id).one(&self.db).await?;
        Ok(row.map(|row| row.error_count))
    }

    async fn touch_last_used(&self, id: Uuid, at: OffsetDateTime) -> StorageResult<()> {
        use entities::credentials::Column;

        let result = entities::Credentials::update_many()
            .col_expr(Column::LastUsedAt, Expr::value(Some(at)))
            .col_expr(Column::UpdatedAt, Expr::value(at))
            .filter(Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        ensure_updated(id, result.rows_affected)
    }

    async fn record_error(
        &self,
        id: Uuid,
        error_count: i32,
        at: OffsetDateTime,
    ) -> StorageResult<()> {
        use entities::credentials::Column;

        let result = entities::Credentials::update_many()
            .col_expr(Column::ErrorCount, Expr::value(error_count))
            .col_expr(Column::LastErrorAt, Expr::value(Some(at)))
            .col_expr(Column::UpdatedAt, Expr::value(at))
            .filter(Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        ensure_updated(id, result.rows_affected)
    }

    async fn reset_errors(&self, id: Uuid) -> StorageResult<()> {
        use entities::credentials::Column;

        let now = OffsetDateTime::now_utc();
        let result = entities::Credentials::update_many()
            .col_expr(Column::ErrorCount, Expr::value(0))
            .col_expr(Column::LastErrorAt, Expr::value(Option::<OffsetDateTime>::None))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        ensure_updated(id, result.rows_affected)
    }

    async fn insert(&self, credential: NewCredential) -> StorageResult<Uuid> {
        let now = OffsetDateTime::now_utc();
        let id = credential.id.unwrap_or_else(Uuid::new_v4);
        let active = entities::credentials::ActiveModel {
            id: ActiveValue::Set(id),
            platform: ActiveValue::Set(credential.platform),
            tier: ActiveValue::Set(credential.tier),
            encrypted_payload: ActiveValue::Set(credential.encrypted_payload),
            daily_quota: ActiveValue::Set(credential.daily_quota),
            monthly_quota: ActiveValue::Set(credential.monthly_quota),
            is_active: ActiveValue::Set(credential.is_active),
            error_count: ActiveValue::Set(0),
            last_error_at: ActiveValue::Set(None),
            last_used_at: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        entities::Credentials::insert(active).exec(&self.db).await?;
        Ok(id)
    }
}
