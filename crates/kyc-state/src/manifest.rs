//! # Identity Manifest
//!
//! The manifest is the immutable blob a subject's identity pointer refers
//! to. It carries the sealed identity record plus references to every
//! uploaded document. Updating an identity publishes a new manifest with
//! `supersedes` pointing at the previous CID; nothing is edited in place.

use kyc_core::{CanonicalBytes, CanonicalizationError, Cid, Timestamp, UserId};
use kyc_crypto::SealedRecord;
use serde::{Deserialize, Serialize};

use crate::subject::TransitionError;

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Plaintext identity payload. Only ever stored sealed.
///
/// `Debug` prints field names only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub full_name: String,
    pub id_number: String,
    /// ISO-8601 calendar date as supplied by the subject.
    pub date_of_birth: String,
    pub address: String,
}

impl IdentityRecord {
    /// Reject blank fields.
    pub fn validate(&self) -> Result<(), TransitionError> {
        let fields = [
            ("full_name", &self.full_name),
            ("id_number", &self.id_number),
            ("date_of_birth", &self.date_of_birth),
            ("address", &self.address),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(TransitionError::IncompleteIdentity(name));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("full_name", &"[REDACTED]")
            .field("id_number", &"[REDACTED]")
            .field("date_of_birth", &"[REDACTED]")
            .field("address", &"[REDACTED]")
            .finish()
    }
}

/// A stored, sealed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// File name supplied by the upload layer.
    pub name: String,
    pub mime_type: String,
    /// CID of the sealed document blob.
    pub cid: Cid,
    /// Plaintext size.
    pub size_bytes: u64,
    pub uploaded_at: Timestamp,
}

/// Immutable identity manifest published to the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityManifest {
    pub version: u32,
    pub subject: UserId,
    pub created_at: Timestamp,
    /// The sealed [`IdentityRecord`].
    pub identity: SealedRecord,
    pub documents: Vec<DocumentRef>,
    /// The manifest this one replaces, if any.
    pub supersedes: Option<Cid>,
}

impl IdentityManifest {
    pub fn new(
        subject: UserId,
        identity: SealedRecord,
        documents: Vec<DocumentRef>,
        supersedes: Option<Cid>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            version: MANIFEST_VERSION,
            subject,
            created_at,
            identity,
            documents,
            supersedes,
        }
    }

    /// Canonical bytes as uploaded to the content store.
    pub fn to_canonical_bytes(&self) -> Result<CanonicalBytes, CanonicalizationError> {
        CanonicalBytes::new(self)
    }

    /// Parse a manifest fetched from the content store.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
