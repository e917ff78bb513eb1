//! Typed audit events.

use kyc_core::{Cid, GrantId, UserId};
use kyc_state::{DocumentRef, KycStatus};
use serde::{Deserialize, Serialize};

/// What happened. Tagged by `action` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A new identity manifest was published and anchored.
    IdentitySubmitted {
        manifest: Cid,
        supersedes: Option<Cid>,
    },
    /// A sealed document was stored and attached.
    DocumentUploaded { document: DocumentRef },
    /// A sealed liveness frame was stored.
    LivenessStepSubmitted { step: u32, evidence: Cid },
    /// An operator recorded the review outcome.
    ChecklistCompleted {
        liveness: bool,
        document: bool,
        outcome: KycStatus,
    },
    AccessGranted { grant_id: GrantId, grantor: UserId },
    AccessRevoked { grant_id: GrantId, grantor: UserId },
    /// An operation aborted before committing.
    OperationFailed {
        attempted: AuditAction,
        stage: String,
        error: String,
    },
}

impl AuditEvent {
    pub fn action(&self) -> AuditAction {
        match self {
            Self::IdentitySubmitted { .. } => AuditAction::IdentitySubmitted,
            Self::DocumentUploaded { .. } => AuditAction::DocumentUploaded,
            Self::LivenessStepSubmitted { .. } => AuditAction::LivenessStepSubmitted,
            Self::ChecklistCompleted { .. } => AuditAction::ChecklistCompleted,
            Self::AccessGranted { .. } => AuditAction::AccessGranted,
            Self::AccessRevoked { .. } => AuditAction::AccessRevoked,
            Self::OperationFailed { .. } => AuditAction::OperationFailed,
        }
    }

    /// The content-store object this event refers to, if any.
    pub fn cid(&self) -> Option<&Cid> {
        match self {
            Self::IdentitySubmitted { manifest, .. } => Some(manifest),
            Self::DocumentUploaded { document } => Some(&document.cid),
            Self::LivenessStepSubmitted { evidence, .. } => Some(evidence),
            _ => None,
        }
    }
}

/// Fieldless kind of an [`AuditEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    IdentitySubmitted,
    DocumentUploaded,
    LivenessStepSubmitted,
    ChecklistCompleted,
    AccessGranted,
    AccessRevoked,
    OperationFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdentitySubmitted => "identity_submitted",
            Self::DocumentUploaded => "document_uploaded",
            Self::LivenessStepSubmitted => "liveness_step_submitted",
            Self::ChecklistCompleted => "checklist_completed",
            Self::AccessGranted => "access_granted",
            Self::AccessRevoked => "access_revoked",
            Self::OperationFailed => "operation_failed",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "identity_submitted" => Self::IdentitySubmitted,
            "document_uploaded" => Self::DocumentUploaded,
            "liveness_step_submitted" => Self::LivenessStepSubmitted,
            "checklist_completed" => Self::ChecklistCompleted,
            "access_granted" => Self::AccessGranted,
            "access_revoked" => Self::AccessRevoked,
            "operation_failed" => Self::OperationFailed,
            other => return Err(format!("unknown audit action {other:?}")),
        };
        Ok(action)
    }
}

/// How far the entry's external effect got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    Confirmed,
    LocalOnly,
    Failed,
}

impl Durability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::LocalOnly => "local_only",
            Self::Failed => "failed",
        }
    }
}
