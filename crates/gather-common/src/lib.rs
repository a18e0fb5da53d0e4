//! Types shared by the credential pool, the rate limiter and the operator CLI.

mod config;
mod errors;
mod kind;

pub use config::{
    ConfigError, DEFAULT_ARENA, DEFAULT_LEASE_TTL_SECS, DEFAULT_REDIS_URL, GatherConfig,
    GatherConfigPatch,
};
pub use errors::AcquireError;
pub use kind::{ErrorKind, env_key_prefix};
