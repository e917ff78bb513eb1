//! Ledger fact vocabulary.

use kyc_core::{Cid, Timestamp, TxRef, UserId};
use serde::{Deserialize, Serialize};

/// An assertion recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerFact {
    /// The subject's current identity manifest lives at `cid`.
    IdentityStored { subject: UserId, cid: Cid },
    /// `grantor` may read `subject`'s identity.
    AccessGranted { grantor: UserId, subject: UserId },
    /// `grantor` may no longer read `subject`'s identity.
    AccessRevoked { grantor: UserId, subject: UserId },
}

/// Fieldless discriminant of [`LedgerFact`], used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    IdentityStored,
    AccessGranted,
    AccessRevoked,
}

impl FactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdentityStored => "identity_stored",
            Self::AccessGranted => "access_granted",
            Self::AccessRevoked => "access_revoked",
        }
    }
}

impl std::fmt::Display for FactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LedgerFact {
    pub fn kind(&self) -> FactKind {
        match self {
            Self::IdentityStored { .. } => FactKind::IdentityStored,
            Self::AccessGranted { .. } => FactKind::AccessGranted,
            Self::AccessRevoked { .. } => FactKind::AccessRevoked,
        }
    }

    /// The subject this fact is about.
    pub fn subject(&self) -> &UserId {
        match self {
            Self::IdentityStored { subject, .. }
            | Self::AccessGranted { subject, .. }
            | Self::AccessRevoked { subject, .. } => subject,
        }
    }
}

/// A submitted, not yet confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTx {
    /// Ledger-assigned handle for the pending transaction.
    pub id: String,
    /// The nonce it was submitted under.
    pub nonce: u64,
    pub fact: LedgerFact,
    pub submitted_at: Timestamp,
}

/// Resolved outcome of a pending transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Confirmation {
    /// The fact is durable.
    Confirmed { tx_ref: TxRef, block_height: u64 },
    /// The ledger dropped the transaction.
    Failed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_wire_shape_is_tagged() {
        let subject = UserId::new();
        let fact = LedgerFact::IdentityStored {
            subject,
            cid: Cid::parse("QmX").unwrap(),
        };
        let wire = serde_json::to_value(&fact).unwrap();
        assert_eq!(wire["type"], "identity_stored");
        assert_eq!(wire["cid"], "QmX");
        assert_eq!(wire["subject"], subject.as_uuid().to_string());
        assert_eq!(fact.kind(), FactKind::IdentityStored);
        assert_eq!(fact.subject(), &subject);
    }

    #[test]
    fn confirmation_parses_both_outcomes() {
        let ok: Confirmation =
            serde_json::from_str(r#"{"status":"confirmed","tx_ref":"0xab","block_height":7}"#).unwrap();
        assert!(matches!(ok, Confirmation::Confirmed { block_height: 7, .. }));
        let failed: Confirmation =
            serde_json::from_str(r#"{"status":"failed","reason":"reverted"}"#).unwrap();
        assert_eq!(failed, Confirmation::Failed { reason: "reverted".into() });
    }
}
