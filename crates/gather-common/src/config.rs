use serde::{Deserialize, Serialize};

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_LEASE_TTL_SECS: u64 = 3600;
pub const DEFAULT_ARENA: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
    #[error("invalid config field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Final, merged configuration used by the running process.
///
/// Merge order: CLI > ENV > defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherConfig {
    /// Coordination store (leases, quotas, cooldowns, rate windows).
    pub redis_url: String,
    /// Durable credential store DSN.
    pub dsn: String,
    /// Key material for the credential payload encryption boundary.
    #[serde(skip_serializing)]
    pub secret: String,
    pub lease_ttl_secs: u64,
    pub default_arena: String,
}

/// Optional layer used for merging config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatherConfigPatch {
    pub redis_url: Option<String>,
    pub dsn: Option<String>,
    pub secret: Option<String>,
    pub lease_ttl_secs: Option<u64>,
    pub default_arena: Option<String>,
}

impl GatherConfigPatch {
    pub fn overlay(&mut self, other: GatherConfigPatch) {
        if other.redis_url.is_some() {
            self.redis_url = other.redis_url;
        }
        if other.dsn.is_some() {
            self.dsn = other.dsn;
        }
        if other.secret.is_some() {
            self.secret = other.secret;
        }
        if other.lease_ttl_secs.is_some() {
            self.lease_ttl_secs = other.lease_ttl_secs;
        }
        if other.default_arena.is_some() {
            self.default_arena = other.default_arena;
        }
    }

    pub fn into_config(self) -> Result<GatherConfig, ConfigError> {
        let secret = self
            .secret
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(ConfigError::MissingField("secret"))?;
        let lease_ttl_secs = self.lease_ttl_secs.unwrap_or(DEFAULT_LEASE_TTL_SECS);
        if lease_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "lease_ttl_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(GatherConfig {
            redis_url: self
                .redis_url
                .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            dsn: self.dsn.ok_or(ConfigError::MissingField("dsn"))?,
            secret,
            lease_ttl_secs,
            default_arena: self
                .default_arena
                .unwrap_or_else(|| DEFAULT_ARENA.to_string()),
        })
    }
}

impl From<GatherConfig> for GatherConfigPatch {
    fn from(value: GatherConfig) -> Self {
        Self {
            redis_url: Some(value.redis_url),
            dsn: Some(value.dsn),
            secret: Some(value.secret),
            lease_ttl_secs: Some(value.lease_ttl_secs),
            default_arena: Some(value.default_arena),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> GatherConfigPatch {
        GatherConfigPatch {
            dsn: Some("sqlite::memory:".to_string()),
            secret: Some("s3cret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn later_layer_wins() {
        let mut patch = base();
        patch.overlay(GatherConfigPatch {
            redis_url: Some("redis://cache:6379".to_string()),
            lease_ttl_secs: Some(120),
            ..Default::default()
        });
        let config = patch.into_config().unwrap();
        assert_eq!(config.redis_url, "redis://cache:6379");
        assert_eq!(config.lease_ttl_secs, 120);
        assert_eq!(config.dsn, "sqlite::memory:");
        assert_eq!(config.default_arena, DEFAULT_ARENA);
    }

    #[test]
    fn empty_layer_keeps_values() {
        let mut patch = base();
        patch.overlay(GatherConfigPatch::default());
        assert_eq!(patch, base());
    }

    #[test]
    fn secret_is_required() {
        let patch = GatherConfigPatch {
            dsn: Some("sqlite::memory:".to_string()),
            secret: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            patch.into_config(),
            Err(ConfigError::MissingField("secret"))
        ));
    }

    #[test]
    fn zero_lease_ttl_is_rejected() {
        let mut patch = base();
        patch.lease_ttl_secs = Some(0);
        assert!(matches!(
            patch.into_config(),
            Err(ConfigError::Invalid { field: "lease_ttl_secs", .. })
        ));
    }

    #[test]
    fn serialized_config_omits_secret() {
        let config = base().into_config().unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("secret").is_none());
        assert_eq!(json["dsn"], "sqlite::memory:");
    }
}
