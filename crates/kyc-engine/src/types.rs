//! Request and response types of the engine API.

use kyc_core::{Cid, Timestamp, TxRef, UserId};
use kyc_state::{AccessGrant, DocumentRef, IdentityRecord, KycStatus};
use serde::{Deserialize, Serialize};

/// A file handed over by the upload layer, already extracted from its
/// transport encoding.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

impl DocumentUpload {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }
}

impl std::fmt::Debug for DocumentUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentUpload")
            .field("bytes", &self.bytes.len())
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Result of a committed identity submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub subject: UserId,
    pub manifest: Cid,
    pub supersedes: Option<Cid>,
    pub tx_ref: TxRef,
    pub block_height: u64,
    pub status: KycStatus,
    /// Audit sequence of the submission entry.
    pub sequence: u64,
}

/// Result of a `grant` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantReceipt {
    pub grant: AccessGrant,
    /// False when an active grant already existed and was returned as is.
    pub created: bool,
}

/// A subject's decrypted identity as returned to an authorized reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityView {
    pub subject: UserId,
    pub status: KycStatus,
    pub manifest: Cid,
    pub created_at: Timestamp,
    pub identity: IdentityRecord,
    pub documents: Vec<DocumentRef>,
}

/// Outcome of rebuilding a projection from the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub subject: UserId,
    /// The cached projection differed from the audit fold and was replaced.
    pub diverged: bool,
    pub last_sequence: u64,
}

/// Operator statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub subjects: usize,
    pub not_started: usize,
    pub pending: usize,
    pub verified: usize,
    pub rejected: usize,
    pub active_grants: usize,
    pub audit_entries: usize,
    /// Background ledger comparisons that disagreed with the projection.
    pub ledger_disagreements: u64,
    /// Reconciliations that replaced a divergent projection.
    pub projection_repairs: u64,
}
