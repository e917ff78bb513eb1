//! # Reconstruction Fold
//!
//! Rebuilds a subject's state from its audit entries by replaying each
//! effective entry through the same transition methods the engine uses
//! when it commits. Entries flagged `failed` are skipped.

use kyc_core::UserId;
use kyc_state::{GrantBook, Subject};
use serde::{Deserialize, Serialize};

use crate::entry::AuditEntry;
use crate::error::AuditError;
use crate::event::AuditEvent;

/// Everything derivable about one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProjection {
    pub subject: Subject,
    pub grants: GrantBook,
    /// Sequence of the last entry folded in, 0 for an empty log.
    pub last_sequence: u64,
}

impl SubjectProjection {
    /// Projection of a subject with no history.
    pub fn empty(id: UserId) -> Self {
        Self {
            subject: Subject::new(id),
            grants: GrantBook::new(),
            last_sequence: 0,
        }
    }
}

/// Apply one entry to a projection.
///
/// Failed entries only advance `last_sequence`.
pub fn apply_entry(projection: &mut SubjectProjection, entry: &AuditEntry) -> Result<(), AuditError> {
    let replay_err = |reason: String| AuditError::Replay {
        subject: entry.subject,
        sequence: entry.sequence,
        reason,
    };
    if entry.is_effective() {
        let at = entry.timestamp;
        let subject = &mut projection.subject;
        match &entry.event {
            AuditEvent::IdentitySubmitted { manifest, .. } => {
                subject
                    .submit(manifest.clone(), at)
                    .map_err(|e| replay_err(e.to_string()))?;
            }
            AuditEvent::DocumentUploaded { document } => {
                subject
                    .attach_document(document.clone())
                    .map_err(|e| replay_err(e.to_string()))?;
            }
            AuditEvent::LivenessStepSubmitted { step, evidence } => {
                subject
                    .record_liveness_step(*step, evidence.clone(), at)
                    .map_err(|e| replay_err(e.to_string()))?;
            }
            AuditEvent::ChecklistCompleted {
                liveness,
                document,
                outcome,
            } => {
                let to = subject
                    .complete_checklist(*liveness, *document, at)
                    .map_err(|e| replay_err(e.to_string()))?;
                if to != *outcome {
                    return Err(replay_err(format!("recorded outcome {outcome} but replay gives {to}")));
                }
            }
            AuditEvent::AccessGranted { grant_id, grantor } => {
                let tx = entry
                    .tx_ref
                    .clone()
                    .ok_or_else(|| replay_err("grant without ledger reference".into()))?;
                projection
                    .grants
                    .grant(*grant_id, *grantor, entry.subject, tx, at)
                    .map_err(|e| replay_err(e.to_string()))?;
            }
            AuditEvent::AccessRevoked { grant_id, grantor } => {
                let tx = entry
                    .tx_ref
                    .clone()
                    .ok_or_else(|| replay_err("revocation without ledger reference".into()))?;
                let revoked = projection
                    .grants
                    .revoke(grantor, tx, at)
                    .map_err(|e| replay_err(e.to_string()))?;
                if revoked.id != *grant_id {
                    return Err(replay_err(format!("revoked {} but entry names {grant_id}", revoked.id)));
                }
            }
            AuditEvent::OperationFailed { .. } => {}
        }
    }
    projection.last_sequence = entry.sequence;
    Ok(())
}

/// Fold a subject's entries, in sequence order, into a projection.
pub fn fold_entries<'a>(
    subject: UserId,
    entries: impl IntoIterator<Item = &'a AuditEntry>,
) -> Result<SubjectProjection, AuditError> {
    let mut projection = SubjectProjection::empty(subject);
    for entry in entries {
        apply_entry(&mut projection, entry)?;
    }
    Ok(projection)
}
