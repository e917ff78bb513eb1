//! # Audit Entries
//!
//! An [`AuditRecord`] is what a caller asks to append; the trail turns it
//! into an [`AuditEntry`] by assigning the sequence number and linking
//! it into the subject's digest chain.

use kyc_core::{sha256_digest, CanonicalBytes, Cid, ContentDigest, Timestamp, TxRef, UserId};
use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::event::{AuditAction, AuditEvent, Durability};

/// A request to append one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub subject: UserId,
    /// The principal who caused the event.
    pub actor: UserId,
    pub timestamp: Timestamp,
    pub event: AuditEvent,
    pub tx_ref: Option<TxRef>,
    pub block_height: Option<u64>,
    pub durability: Durability,
    /// Opaque, operator-facing context. Must not contain floats.
    pub details: serde_json::Value,
}

impl AuditRecord {
    /// A record for an action with no external effect to confirm.
    pub fn local(subject: UserId, actor: UserId, timestamp: Timestamp, event: AuditEvent) -> Self {
        Self {
            subject,
            actor,
            timestamp,
            event,
            tx_ref: None,
            block_height: None,
            durability: Durability::LocalOnly,
            details: serde_json::Value::Null,
        }
    }

    /// A record whose external effect was acknowledged.
    pub fn confirmed(subject: UserId, actor: UserId, timestamp: Timestamp, event: AuditEvent) -> Self {
        Self {
            durability: Durability::Confirmed,
            ..Self::local(subject, actor, timestamp, event)
        }
    }

    /// Attach the ledger transaction that made this event durable.
    pub fn with_ledger(mut self, tx_ref: TxRef, block_height: u64) -> Self {
        self.tx_ref = Some(tx_ref);
        self.block_height = Some(block_height);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// One immutable, chained audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub subject: UserId,
    /// Position in the subject's log, starting at 1.
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub actor: UserId,
    pub event: AuditEvent,
    pub cid: Option<Cid>,
    pub tx_ref: Option<TxRef>,
    pub block_height: Option<u64>,
    pub durability: Durability,
    #[serde(default)]
    pub details: serde_json::Value,
    /// Digest of the previous entry for this subject.
    pub prev_digest: Option<ContentDigest>,
    /// Digest over every field above.
    pub digest: ContentDigest,
}

/// Borrowed view of the digested fields.
#[derive(Serialize)]
struct DigestInput<'a> {
    subject: &'a UserId,
    sequence: u64,
    timestamp: &'a Timestamp,
    actor: &'a UserId,
    event: &'a AuditEvent,
    cid: &'a Option<Cid>,
    tx_ref: &'a Option<TxRef>,
    block_height: &'a Option<u64>,
    durability: &'a Durability,
    details: &'a serde_json::Value,
    prev_digest: &'a Option<ContentDigest>,
}

impl DigestInput<'_> {
    fn digest(&self) -> Result<ContentDigest, AuditError> {
        Ok(sha256_digest(&CanonicalBytes::new(self)?))
    }
}

impl AuditEntry {
    /// Seal `record` at `sequence` after `prev_digest`.
    pub(crate) fn seal(
        record: AuditRecord,
        sequence: u64,
        prev_digest: Option<ContentDigest>,
    ) -> Result<Self, AuditError> {
        let cid = record.event.cid().cloned();
        let digest = DigestInput {
            subject: &record.subject,
            sequence,
            timestamp: &record.timestamp,
            actor: &record.actor,
            event: &record.event,
            cid: &cid,
            tx_ref: &record.tx_ref,
            block_height: &record.block_height,
            durability: &record.durability,
            details: &record.details,
            prev_digest: &prev_digest,
        }
        .digest()?;
        Ok(Self {
            subject: record.subject,
            sequence,
            timestamp: record.timestamp,
            actor: record.actor,
            event: record.event,
            cid,
            tx_ref: record.tx_ref,
            block_height: record.block_height,
            durability: record.durability,
            details: record.details,
            prev_digest,
            digest,
        })
    }

    /// Recompute the digest from the entry's fields.
    pub fn compute_digest(&self) -> Result<ContentDigest, AuditError> {
        let input = DigestInput {
            subject: &self.subject,
            sequence: self.sequence,
            timestamp: &self.timestamp,
            actor: &self.actor,
            event: &self.event,
            cid: &self.cid,
            tx_ref: &self.tx_ref,
            block_height: &self.block_height,
            durability: &self.durability,
            details: &self.details,
            prev_digest: &self.prev_digest,
        };
        input.digest()
    }

    pub fn action(&self) -> AuditAction {
        self.event.action()
    }

    /// Whether the fold applies this entry.
    pub fn is_effective(&self) -> bool {
        self.durability != Durability::Failed
    }
}
