//! Content store error types.

use kyc_core::Cid;
use thiserror::Error;

/// Errors from content store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Network or service failure. Transient.
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    /// Size or rate limit hit. Retried with backoff, then surfaced.
    #[error("content store quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The store does not know this CID.
    #[error("content {0} not found in store")]
    NotFound(Cid),
}

impl StoreError {
    /// Whether `put` may retry after this error.
    pub fn is_retryable_put(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::QuotaExceeded(_))
    }

    /// Whether `get` may retry after this error.
    pub fn is_retryable_get(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
