//! Ledger error types.

use thiserror::Error;

/// Errors from ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Network failure or 5xx from the ledger service. Transient.
    #[error("ledger transport error: {0}")]
    Transport(String),

    /// The ledger refused the submission (bad request, reused nonce).
    #[error("ledger rejected submission: {0}")]
    Rejected(String),

    /// The ledger answered with a body that does not match the contract.
    #[error("malformed ledger response: {0}")]
    Malformed(String),

    /// The transaction resolved as failed.
    #[error("ledger transaction {pending_id} failed: {reason}")]
    ConfirmationFailed { pending_id: String, reason: String },

    /// No confirmation within the configured bound.
    #[error("ledger confirmation for {pending_id} timed out after {after_ms}ms")]
    ConfirmationTimeout { pending_id: String, after_ms: u64 },

    /// Every attempt failed; `last` is the final failure.
    #[error("ledger gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<LedgerError>,
    },
}

impl LedgerError {
    /// Whether a fresh submission may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ConfirmationFailed { .. } | Self::ConfirmationTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(LedgerError::Transport("x".into()).is_retryable());
        assert!(LedgerError::ConfirmationTimeout { pending_id: "p".into(), after_ms: 1 }.is_retryable());
        assert!(!LedgerError::Rejected("nonce".into()).is_retryable());
        assert!(!LedgerError::Malformed("{}".into()).is_retryable());
    }

    #[test]
    fn exhausted_exposes_last_failure_as_source() {
        use std::error::Error as _;
        let err = LedgerError::Exhausted {
            attempts: 3,
            last: Box::new(LedgerError::ConfirmationFailed {
                pending_id: "p-1".into(),
                reason: "reverted".into(),
            }),
        };
        assert!(err.to_string().contains("3 attempts"));
        assert!(err.source().is_some());
    }
}
