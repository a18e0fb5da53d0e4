use std::time::Duration;

use serde_json::{Map, Value as JsonValue};

pub const API_KEY_FIELD: &str = "api_key";

/// A credential handed to a collector for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct LeasedCredential {
    /// UUID string for durable credentials, the variable name for env keys.
    pub id: String,
    pub platform: String,
    pub tier: String,
    /// Task the lease was recorded under; `None` for env credentials.
    pub task_id: Option<String>,
    pub fields: Map<String, JsonValue>,
}

impl LeasedCredential {
    pub(crate) fn new(
        id: impl Into<String>,
        platform: &str,
        tier: &str,
        task_id: Option<String>,
        mut fields: Map<String, JsonValue>,
    ) -> Self {
        if !fields.contains_key(API_KEY_FIELD) {
            let fallback = fields
                .values()
                .find_map(|value| value.as_str().map(str::to_string));
            if let Some(fallback) = fallback {
                fields.insert(API_KEY_FIELD.to_string(), JsonValue::String(fallback));
            }
        }
        Self {
            id: id.into(),
            platform: platform.to_string(),
            tier: tier.to_string(),
            task_id,
            fields,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.fields.get(API_KEY_FIELD).and_then(JsonValue::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    None,
    For(Duration),
    /// Env credentials: until restart or `reset_env_credential`.
    UntilReset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorOutcome {
    pub error_count: u32,
    pub exclusion: Exclusion,
    /// The breaker threshold was reached.
    pub tripped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotaUsage {
    pub daily: i64,
    pub monthly: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownStatus {
    pub error_count: i64,
    pub remaining: Option<Duration>,
}
