//! Credential pool for the collectors.
//!
//! Durable credential records are read from a [`CredentialStore`], decrypted
//! in-process and tracked in the shared coordination store (leases, quota
//! counters, cooldown markers). When no durable record qualifies, keys from
//! the process environment are used instead, with cooldown state kept in
//! this process only.
//!
//! [`CredentialStore`]: gather_storage::CredentialStore

mod crypto;
mod env;
mod lease;
mod pool;
mod quota;

pub use crypto::{CryptoError, ENCRYPTED_PREFIX, Encryptor};
pub use env::{EnvLookup, process_env};
pub use lease::{CooldownStatus, ErrorOutcome, Exclusion, LeasedCredential, QuotaUsage};
pub use pool::{CredentialPool, PoolError, PoolSettings};
pub use quota::until_window_end;
