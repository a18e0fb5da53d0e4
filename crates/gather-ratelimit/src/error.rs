use std::time::Duration;

use gather_coord::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// `wait_for_slot` ran out of budget. Callers treat this as "retry later".
    #[error("no rate-limit slot for {key} within {waited:?}")]
    Timeout { key: String, waited: Duration },
    #[error(transparent)]
    Store(#[from] StoreError),
}
