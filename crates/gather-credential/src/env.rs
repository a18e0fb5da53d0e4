use std::collections::HashMap;
use std::sync::Arc;

use gather_common::{ErrorKind, env_key_prefix};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::lease::{API_KEY_FIELD, ErrorOutcome, Exclusion, LeasedCredential};

/// Reads one environment variable. Injectable so tests never touch the
/// process environment.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub fn process_env() -> EnvLookup {
    Arc::new(|name| std::env::var(name).ok())
}

#[derive(Debug, Clone, Default)]
struct EnvCredentialState {
    error_count: u32,
    cooling: bool,
}

impl EnvCredentialState {
    fn is_usable(&self, threshold: u32) -> bool {
        !self.cooling && self.error_count < threshold
    }
}

/// Environment-variable credentials with breaker state local to this process.
pub(crate) struct EnvFallback {
    lookup: EnvLookup,
    states: RwLock<HashMap<String, EnvCredentialState>>,
}

impl EnvFallback {
    pub(crate) fn new(lookup: EnvLookup) -> Self {
        Self {
            lookup,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// `{PREFIX}`, then `{PREFIX}_2`, `{PREFIX}_3`, ... up to the first gap.
    fn candidates(&self, platform: &str, tier: &str) -> Vec<(String, String)> {
        let prefix = env_key_prefix(platform, tier);
        let mut found = Vec::new();
        if let Some(value) = self.read(&prefix) {
            found.push((prefix.clone(), value));
        }
        for index in 2.. {
            let name = format!("{prefix}_{index}");
            match self.read(&name) {
                Some(value) => found.push((name, value)),
                None => break,
            }
        }
        found
    }

    fn read(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    pub(crate) async fn acquire(
        &self,
        platform: &str,
        tier: &str,
        threshold: u32,
    ) -> Option<LeasedCredential> {
        let candidates = self.candidates(platform, tier);
        if candidates.is_empty() {
            return None;
        }
        let states = self.states.read().await;
        for (name, value) in candidates {
            if let Some(state) = states.get(&name)
                && !state.is_usable(threshold)
            {
                debug!(
                    event = "credential.env_skipped",
                    credential_id = %name,
                    error_count = state.error_count,
                    cooling = state.cooling
                );
                continue;
            }
            let mut fields = Map::new();
            fields.insert(API_KEY_FIELD.to_string(), JsonValue::String(value));
            debug!(event = "credential.env_acquired", credential_id = %name, platform = %platform, tier = %tier);
            return Some(LeasedCredential::new(name, platform, tier, None, fields));
        }
        None
    }

    pub(crate) async fn report_error(
        &self,
        name: &str,
        kind: ErrorKind,
        threshold: u32,
    ) -> ErrorOutcome {
        let mut states = self.states.write().await;
        let state = states.entry(name.to_string()).or_default();
        state.error_count = state.error_count.saturating_add(1);
        if kind.forces_cooldown() {
            state.cooling = true;
        }
        let tripped = state.error_count >= threshold;
        let exclusion = if state.cooling || tripped {
            Exclusion::UntilReset
        } else {
            Exclusion::None
        };
        warn!(
            event = "credential.env_error",
            credential_id = %name,
            kind = %kind,
            error_count = state.error_count,
            tripped = tripped
        );
        ErrorOutcome {
            error_count: state.error_count,
            exclusion,
            tripped,
        }
    }

    /// Returns whether the credential had any recorded state.
    pub(crate) async fn reset(&self, name: &str) -> bool {
        self.states.write().await.remove(name).is_some()
    }
}
