//! Durable credential records.
//!
//! The relational store is the source of truth for credential identity and
//! limits. It is read-heavy; the only writes issued by the coordination layer
//! are `last_used_at`, `error_count` and `last_error_at`.

pub mod db;
pub mod entities;
mod memory;
mod record;
mod storage;

pub use memory::MemoryCredentialStore;
pub use record::{CredentialRecord, NewCredential, sort_least_recently_used};
pub use storage::{CredentialStorage, CredentialStore, StorageError, StorageResult};
