use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gather_common::{DEFAULT_ARENA, DEFAULT_REDIS_URL, GatherConfig, GatherConfigPatch};
use gather_coord::{CoordinationStore, RedisStore};
use gather_credential::{CredentialPool, Encryptor, PoolSettings};
use gather_ratelimit::RateLimiter;
use gather_storage::{CredentialStorage, CredentialStore, NewCredential};
use serde_json::{Value as JsonValue, json};
use tracing::info;
use uuid::Uuid;

mod cli;
mod dsn;

use crate::cli::{Cli, Command, GlobalArgs};
use crate::dsn::default_dsn;

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("gather failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();
    let patch = layered_patch(&cli.global);

    match cli.command {
        Command::Sync => {
            let storage = connect_storage(&patch).await?;
            storage.sync().await?;
            storage.health().await?;
            info!(event = "gather.schema_synced", "credentials schema synced");
        }
        Command::Encrypt { payload } => {
            let encryptor = encryptor(&patch)?;
            let payload: JsonValue = serde_json::from_str(&payload)?;
            println!("{}", encryptor.encrypt_payload(&payload)?);
        }
        Command::AddCredential {
            platform,
            tier,
            payload,
            daily_quota,
            monthly_quota,
            inactive,
        } => {
            let encryptor = encryptor(&patch)?;
            let stored = if Encryptor::is_encrypted(&payload) {
                encryptor.decrypt(&payload)?;
                payload
            } else {
                let payload: JsonValue = serde_json::from_str(&payload)?;
                if !payload.is_object() {
                    return Err("credential payload must be a JSON object".into());
                }
                encryptor.encrypt_payload(&payload)?
            };
            let mut credential = NewCredential::new(platform, tier, JsonValue::String(stored));
            credential.daily_quota = daily_quota;
            credential.monthly_quota = monthly_quota;
            credential.is_active = !inactive;

            let storage = connect_storage(&patch).await?;
            storage.sync().await?;
            let id = storage.insert(credential).await?;
            info!(event = "gather.credential_added", credential_id = %id);
            println!("{id}");
        }
        Command::ResetCredential { id } => {
            let id = Uuid::parse_str(&id).map_err(|_| {
                format!("{id} is not a durable credential id; env credentials reset on restart")
            })?;
            let pool = build_pool(&patch.into_config()?).await?;
            pool.reset_errors(id).await?;
            println!("reset {id}");
        }
        Command::ResetRateLimit { provider, suffix } => {
            let config = coord_config(&patch);
            let limiter = RateLimiter::new(connect_coord(&config.redis_url).await?);
            let removed = limiter
                .reset(&config.default_arena, &provider, &suffix)
                .await?;
            println!("removed {removed} window(s)");
        }
        Command::Status { id } => {
            let pool = build_pool(&patch.into_config()?).await?;
            let cooldown = pool.cooldown_status(&id).await?;
            let quota = pool.quota_usage(&id).await?;
            let record = match Uuid::parse_str(&id) {
                Ok(_) => pool.record(&id).await?,
                Err(_) => None,
            };
            let status = json!({
                "id": id,
                "platform": record.as_ref().map(|r| r.platform.clone()),
                "tier": record.as_ref().map(|r| r.tier.clone()),
                "is_active": record.as_ref().map(|r| r.is_active),
                "error_count": record.as_ref().map(|r| r.error_count),
                "last_error_at": record.as_ref().and_then(|r| r.last_error_at).map(|t| t.to_string()),
                "last_used_at": record.as_ref().and_then(|r| r.last_used_at).map(|t| t.to_string()),
                "daily_quota": record.as_ref().and_then(|r| r.daily_quota),
                "monthly_quota": record.as_ref().and_then(|r| r.monthly_quota),
                "daily_used": quota.daily,
                "monthly_used": quota.monthly,
                "cooldown": cooldown.map(|c| json!({
                    "error_count": c.error_count,
                    "remaining_secs": c.remaining.map(|d| d.as_secs()),
                })),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::WaitTime { provider, suffix } => {
            let config = coord_config(&patch);
            let limiter = RateLimiter::new(connect_coord(&config.redis_url).await?);
            let arena = &config.default_arena;
            let effective = limiter.effective_config(&provider, None);
            let limited = limiter
                .is_rate_limited(arena, &provider, &suffix, None)
                .await;
            let wait = limiter.get_wait_time(arena, &provider, &suffix, None).await;
            let report = json!({
                "arena": arena,
                "provider": provider,
                "suffix": suffix,
                "limits": effective,
                "rate_limited": limited,
                "wait_secs": wait.as_secs_f64(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Defaults < CLI/ENV (clap already prefers flags over env vars).
fn layered_patch(global: &GlobalArgs) -> GatherConfigPatch {
    let mut patch = GatherConfigPatch {
        dsn: Some(default_dsn(&global.data_dir)),
        ..Default::default()
    };
    patch.overlay(global.patch());
    patch
}

/// Coordination-only commands need neither the secret nor the DSN.
fn coord_config(patch: &GatherConfigPatch) -> CoordTarget {
    CoordTarget {
        redis_url: patch
            .redis_url
            .clone()
            .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
        default_arena: patch
            .default_arena
            .clone()
            .unwrap_or_else(|| DEFAULT_ARENA.to_string()),
    }
}

struct CoordTarget {
    redis_url: String,
    default_arena: String,
}

fn encryptor(patch: &GatherConfigPatch) -> AppResult<Encryptor> {
    let secret = patch
        .secret
        .as_deref()
        .filter(|secret| !secret.trim().is_empty())
        .ok_or("missing secret (--secret or GATHER_SECRET)")?;
    Ok(Encryptor::new(secret))
}

async fn connect_storage(patch: &GatherConfigPatch) -> AppResult<CredentialStorage> {
    let dsn = patch.dsn.as_deref().ok_or("missing dsn")?;
    Ok(CredentialStorage::connect(dsn).await?)
}

async fn connect_coord(redis_url: &str) -> AppResult<Arc<dyn CoordinationStore>> {
    let store = RedisStore::connect(redis_url).await?;
    store.ping().await?;
    Ok(Arc::new(store))
}

async fn build_pool(config: &GatherConfig) -> AppResult<CredentialPool> {
    let store = connect_coord(&config.redis_url).await?;
    let storage = CredentialStorage::connect(&config.dsn).await?;
    storage.health().await?;
    info!(
        event = "gather.pool_ready",
        arena = %config.default_arena,
        lease_ttl_secs = config.lease_ttl_secs
    );
    let settings = PoolSettings {
        lease_ttl: Duration::from_secs(config.lease_ttl_secs),
        ..PoolSettings::default()
    };
    Ok(
        CredentialPool::new(store, Arc::new(storage), Encryptor::new(&config.secret))
            .with_settings(settings),
    )
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gather=info,sqlx=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
