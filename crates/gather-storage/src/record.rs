use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::entities;

/// A durable credential as the pool sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub platform: String,
    pub tier: String,
    pub encrypted_payload: JsonValue,
    pub daily_quota: Option<i64>,
    pub monthly_quota: Option<i64>,
    pub is_active: bool,
    pub error_count: i32,
    pub last_error_at: Option<OffsetDateTime>,
    pub last_used_at: Option<OffsetDateTime>,
}

impl From<entities::credentials::Model> for CredentialRecord {
    fn from(model: entities::credentials::Model) -> Self {
        Self {
            id: model.id,
            platform: model.platform,
            tier: model.tier,
            encrypted_payload: model.encrypted_payload,
            daily_quota: model.daily_quota,
            monthly_quota: model.monthly_quota,
            is_active: model.is_active,
            error_count: model.error_count,
            last_error_at: model.last_error_at,
            last_used_at: model.last_used_at,
        }
    }
}

/// Admin-side input for a new credential.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub id: Option<Uuid>,
    pub platform: String,
    pub tier: String,
    pub encrypted_payload: JsonValue,
    pub daily_quota: Option<i64>,
    pub monthly_quota: Option<i64>,
    pub is_active: bool,
}

impl NewCredential {
    pub fn new(platform: impl Into<String>, tier: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            id: None,
            platform: platform.into(),
            tier: tier.into(),
            encrypted_payload: payload,
            daily_quota: None,
            monthly_quota: None,
            is_active: true,
        }
    }

    pub fn with_daily_quota(mut self, quota: i64) -> Self {
        self.daily_quota = Some(quota);
        self
    }

    pub fn with_monthly_quota(mut self, quota: i64) -> Self {
        self.monthly_quota = Some(quota);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Never-used first, then oldest `last_used_at` first. Stable, so ties keep
/// the backend's order regardless of how it sorts NULLs.
pub fn sort_least_recently_used(records: &mut [CredentialRecord]) {
    records.sort_by(|a, b| match (a.last_used_at, b.last_used_at) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(&b),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn record(last_used_at: Option<OffsetDateTime>) -> CredentialRecord {
        CredentialRecord {
            id: Uuid::new_v4(),
            platform: "reddit".to_string(),
            tier: "free".to_string(),
            encrypted_payload: serde_json::json!({}),
            daily_quota: None,
            monthly_quota: None,
            is_active: true,
            error_count: 0,
            last_error_at: None,
            last_used_at,
        }
    }

    #[test]
    fn never_used_sorts_first_then_oldest() {
        let now = OffsetDateTime::now_utc();
        let recent = record(Some(now));
        let old = record(Some(now - Duration::hours(3)));
        let never = record(None);
        let mut records = vec![recent.clone(), never.clone(), old.clone()];
        sort_least_recently_used(&mut records);
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![never.id, old.id, recent.id]);
    }
}
