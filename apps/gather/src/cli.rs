use clap::{Args, Parser, Subcommand};
use gather_common::GatherConfigPatch;

#[derive(Parser)]
#[command(name = "gather", about = "Operate the collector credential pool and rate limiter")]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) global: GlobalArgs,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Args)]
pub(crate) struct GlobalArgs {
    #[arg(long, env = "GATHER_REDIS_URL", global = true)]
    pub(crate) redis_url: Option<String>,
    #[arg(long, env = "GATHER_DSN", global = true)]
    pub(crate) dsn: Option<String>,
    #[arg(long, env = "GATHER_DATA_DIR", default_value = "./data", global = true)]
    pub(crate) data_dir: String,
    #[arg(long, env = "GATHER_SECRET", hide_env_values = true, global = true)]
    pub(crate) secret: Option<String>,
    #[arg(long, env = "GATHER_LEASE_TTL_SECS", global = true)]
    pub(crate) lease_ttl_secs: Option<u64>,
    #[arg(long, env = "GATHER_ARENA", global = true)]
    pub(crate) arena: Option<String>,
}

impl GlobalArgs {
    pub(crate) fn patch(&self) -> GatherConfigPatch {
        GatherConfigPatch {
            redis_url: self.redis_url.clone(),
            dsn: self.dsn.clone().filter(|dsn| !dsn.trim().is_empty()),
            secret: self.secret.clone(),
            lease_ttl_secs: self.lease_ttl_secs,
            default_arena: self.arena.clone(),
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create or update the credentials schema.
    Sync,
    /// Encrypt a JSON payload for the `encrypted_payload` column.
    Encrypt {
        payload: String,
    },
    /// Store a new credential; the payload is encrypted unless it already is.
    AddCredential {
        #[arg(long)]
        platform: String,
        #[arg(long)]
        tier: String,
        #[arg(long)]
        payload: String,
        #[arg(long)]
        daily_quota: Option<i64>,
        #[arg(long)]
        monthly_quota: Option<i64>,
        #[arg(long)]
        inactive: bool,
    },
    /// Reset a tripped circuit breaker.
    ResetCredential {
        id: String,
    },
    /// Drop every rate-limit window of a scope.
    ResetRateLimit {
        provider: String,
        #[arg(default_value = "default")]
        suffix: String,
    },
    /// Cooldown and quota counters of one credential.
    Status {
        id: String,
    },
    /// Remaining wait before a scope admits another call.
    WaitTime {
        provider: String,
        #[arg(default_value = "default")]
        suffix: String,
    },
}
