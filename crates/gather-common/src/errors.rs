/// Returned by `CredentialPool::acquire` once every durable candidate and every
/// environment fallback has been evaluated and none qualified.
///
/// Fatal for the current job, transient across jobs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    #[error("no usable credential for {platform}/{tier}")]
    NoCredentialAvailable { platform: String, tier: String },
}

impl AcquireError {
    pub fn unavailable(platform: impl Into<String>, tier: impl Into<String>) -> Self {
        Self::NoCredentialAvailable {
            platform: platform.into(),
            tier: tier.into(),
        }
    }

    pub fn platform(&self) -> &str {
        match self {
            AcquireError::NoCredentialAvailable { platform, .. } => platform,
        }
    }

    pub fn tier(&self) -> &str {
        match self {
            AcquireError::NoCredentialAvailable { tier, .. } => tier,
        }
    }
}
