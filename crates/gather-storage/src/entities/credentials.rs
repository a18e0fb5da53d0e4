use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "credentials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub platform: String,
    pub tier: String,
    /// Ciphertext string (`enc2:...`) or, for dev/test injection, a plain object.
    pub encrypted_payload: Json,
    pub daily_quota: Option<i64>,
    pub monthly_quota: Option<i64>,
    pub is_active: bool,
    pub error_count: i32,
    pub last_error_at: Option<OffsetDateTime>,
    pub last_used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ActiveModelBehavior for ActiveModel {}
