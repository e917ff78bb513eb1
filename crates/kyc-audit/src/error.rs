//! Audit trail error types.

use kyc_core::{CanonicalizationError, UserId};
use thiserror::Error;

/// Errors from audit trail operations.
#[derive(Error, Debug)]
pub enum AuditError {
    /// An entry could not be canonicalized for digesting.
    #[error("audit entry canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Journal I/O failed.
    #[error("audit journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A journal line did not parse.
    #[error("audit journal line {line} is malformed: {source}")]
    MalformedJournal {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Sequence numbers or digest links do not line up.
    #[error("audit chain for {subject} broken at sequence {sequence}: {reason}")]
    ChainBroken {
        subject: UserId,
        sequence: u64,
        reason: String,
    },

    /// An entry describes a transition that is illegal at its position.
    #[error("cannot replay {subject} entry {sequence}: {reason}")]
    Replay {
        subject: UserId,
        sequence: u64,
        reason: String,
    },
}
