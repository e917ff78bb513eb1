//! # Subject Lifecycle
//!
//! A [`Subject`] is a person undergoing verification. Its status only
//! changes through the methods on this type; each one validates the
//! current state first and returns [`TransitionError`] without touching
//! anything when the move is illegal.

use std::collections::BTreeMap;

use kyc_core::{Cid, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::manifest::DocumentRef;

/// Checklist entry name for the overall liveness result.
pub const LIVENESS_CHECK: &str = "livenessCheck";
/// Checklist entry name for the document review result.
pub const DOCUMENT_CHECK: &str = "documentCheck";

// ─── Status ──────────────────────────────────────────────────────────

/// KYC status of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    #[default]
    NotStarted,
    Pending,
    Verified,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    /// All statuses, in lifecycle order.
    pub fn all() -> [KycStatus; 4] {
        [Self::NotStarted, Self::Pending, Self::Verified, Self::Rejected]
    }
}

impl std::fmt::Display for KycStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations that change a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectAction {
    Submit,
    CompleteChecklist,
    RecordLivenessStep,
    AttachDocument,
}

impl std::fmt::Display for SubjectAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Submit => "submit",
            Self::CompleteChecklist => "complete_checklist",
            Self::RecordLivenessStep => "record_liveness_step",
            Self::AttachDocument => "attach_document",
        };
        f.write_str(s)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from subject transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The action is not legal from the current status.
    #[error("cannot {action} while status is {from}")]
    InvalidTransition { from: KycStatus, action: SubjectAction },

    /// Liveness steps are numbered from 1.
    #[error("liveness step must be at least 1, got {0}")]
    InvalidLivenessStep(u32),

    /// A required identity field is blank.
    #[error("identity field {0} must not be empty")]
    IncompleteIdentity(&'static str),
}

// ─── Checklist ───────────────────────────────────────────────────────

/// One named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub passed: bool,
    pub completed_at: Timestamp,
    /// Evidence blob, for checks backed by captured media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<Cid>,
}

/// Named boolean checks gathered during one submission cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerificationChecklist {
    entries: BTreeMap<String, ChecklistEntry>,
}

impl VerificationChecklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: impl Into<String>, entry: ChecklistEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&ChecklistEntry> {
        self.entries.get(name)
    }

    /// Whether `name` is present and passed.
    pub fn is_passed(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.passed)
    }

    /// Both the liveness and the document check passed.
    pub fn is_satisfied(&self) -> bool {
        self.is_passed(LIVENESS_CHECK) && self.is_passed(DOCUMENT_CHECK)
    }

    /// Number of `liveness-step-N` entries recorded.
    pub fn liveness_steps(&self) -> usize {
        self.entries
            .keys()
            .filter(|k| k.starts_with("liveness-step-"))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChecklistEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Checklist key for a captured liveness frame.
pub fn liveness_step_key(step: u32) -> String {
    format!("liveness-step-{step}")
}

// ─── Subject ─────────────────────────────────────────────────────────

/// A person undergoing verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: UserId,
    pub status: KycStatus,
    /// CID of the latest identity manifest.
    pub identity_pointer: Option<Cid>,
    pub checklist: VerificationChecklist,
    /// Documents referenced by the next manifest.
    pub documents: Vec<DocumentRef>,
    /// Number of identity submissions so far.
    pub submissions: u32,
    pub updated_at: Option<Timestamp>,
}

impl Subject {
    /// A subject that has not submitted anything.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            status: KycStatus::NotStarted,
            identity_pointer: None,
            checklist: VerificationChecklist::new(),
            documents: Vec::new(),
            submissions: 0,
            updated_at: None,
        }
    }

    /// Submit is legal from every status.
    pub fn can_submit(&self) -> Result<(), TransitionError> {
        Ok(())
    }

    /// Point at a new manifest and restart the review cycle.
    pub fn submit(&mut self, manifest: Cid, at: Timestamp) -> Result<(), TransitionError> {
        self.can_submit()?;
        self.identity_pointer = Some(manifest);
        self.checklist.clear();
        self.submissions = self.submissions.saturating_add(1);
        self.do_transition(KycStatus::Pending, at);
        Ok(())
    }

    /// Checks whether `complete_checklist` would succeed.
    pub fn can_complete_checklist(&self) -> Result<(), TransitionError> {
        self.require_state(KycStatus::Pending, SubjectAction::CompleteChecklist)
    }

    /// Record the operator's liveness and document results.
    ///
    /// Both passing moves the subject to `Verified`; any failure moves it
    /// to `Rejected`. Returns the resulting status.
    pub fn complete_checklist(
        &mut self,
        liveness: bool,
        document: bool,
        at: Timestamp,
    ) -> Result<KycStatus, TransitionError> {
        self.can_complete_checklist()?;
        let entry = |passed| ChecklistEntry {
            passed,
            completed_at: at,
            cid: None,
        };
        self.checklist.record(LIVENESS_CHECK, entry(liveness));
        self.checklist.record(DOCUMENT_CHECK, entry(document));
        let to = if self.checklist.is_satisfied() {
            KycStatus::Verified
        } else {
            KycStatus::Rejected
        };
        self.do_transition(to, at);
        Ok(to)
    }

    /// Checks whether a liveness frame may be recorded.
    pub fn can_record_liveness_step(&self, step: u32) -> Result<(), TransitionError> {
        self.require_state(KycStatus::Pending, SubjectAction::RecordLivenessStep)?;
        if step == 0 {
            return Err(TransitionError::InvalidLivenessStep(step));
        }
        Ok(())
    }

    /// Record a captured liveness frame as checklist entry
    /// `liveness-step-N`. Re-recording a step replaces it.
    pub fn record_liveness_step(
        &mut self,
        step: u32,
        evidence: Cid,
        at: Timestamp,
    ) -> Result<(), TransitionError> {
        self.can_record_liveness_step(step)?;
        self.checklist.record(
            liveness_step_key(step),
            ChecklistEntry {
                passed: true,
                completed_at: at,
                cid: Some(evidence),
            },
        );
        self.updated_at = Some(at);
        Ok(())
    }

    /// Documents cannot be added after verification without resubmitting.
    pub fn can_attach_document(&self) -> Result<(), TransitionError> {
        if self.status == KycStatus::Verified {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                action: SubjectAction::AttachDocument,
            });
        }
        Ok(())
    }

    /// Attach an uploaded document. A document with the same name
    /// replaces the earlier one.
    pub fn attach_document(&mut self, doc: DocumentRef) -> Result<(), TransitionError> {
        self.can_attach_document()?;
        let at = doc.uploaded_at;
        self.documents.retain(|d| d.name != doc.name);
        self.documents.push(doc);
        self.updated_at = Some(at);
        Ok(())
    }

    fn require_state(&self, expected: KycStatus, action: SubjectAction) -> Result<(), TransitionError> {
        if self.status != expected {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                action,
            });
        }
        Ok(())
    }

    fn do_transition(&mut self, to: KycStatus, at: Timestamp) {
        self.status = to;
        self.updated_at = Some(at);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(tag: &str) -> Cid {
        Cid::parse(format!("sha256:{tag}")).unwrap()
    }

    fn pending() -> Subject {
        let mut s = Subject::new(UserId::new());
        s.submit(cid("a"), Timestamp::now()).unwrap();
        s
    }

    #[test]
    fn submit_moves_to_pending_and_sets_pointer() {
        let s = pending();
        assert_eq!(s.status, KycStatus::Pending);
        assert_eq!(s.identity_pointer, Some(cid("a")));
        assert_eq!(s.submissions, 1);
    }

    #[test]
    fn both_checks_pass_verifies() {
        let mut s = pending();
        let to = s.complete_checklist(true, true, Timestamp::now()).unwrap();
        assert_eq!(to, KycStatus::Verified);
        assert!(s.checklist.is_passed(LIVENESS_CHECK));
        assert!(s.checklist.is_passed(DOCUMENT_CHECK));
    }

    #[test]
    fn any_failure_rejects() {
        for (l, d) in [(false, true), (true, false), (false, false)] {
            let mut s = pending();
            assert_eq!(
                s.complete_checklist(l, d, Timestamp::now()).unwrap(),
                KycStatus::Rejected
            );
        }
    }

    #[test]
    fn checklist_requires_pending() {
        let mut s = Subject::new(UserId::new());
        let err = s.complete_checklist(true, true, Timestamp::now()).unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: KycStatus::NotStarted,
                action: SubjectAction::CompleteChecklist
            }
        );
        assert_eq!(s.status, KycStatus::NotStarted);

        let mut s = pending();
        s.complete_checklist(true, true, Timestamp::now()).unwrap();
        assert!(s.complete_checklist(false, false, Timestamp::now()).is_err());
        assert_eq!(s.status, KycStatus::Verified);
    }

    #[test]
    fn resubmit_from_any_state_resets_checklist() {
        let mut s = pending();
        s.record_liveness_step(1, cid("frame"), Timestamp::now()).unwrap();
        s.submit(cid("b"), Timestamp::now()).unwrap();
        assert!(s.checklist.is_empty(), "pending update restarts the checklist");

        s.complete_checklist(true, true, Timestamp::now()).unwrap();
        s.submit(cid("c"), Timestamp::now()).unwrap();
        assert_eq!(s.status, KycStatus::Pending);
        assert!(s.checklist.is_empty());

        s.complete_checklist(false, true, Timestamp::now()).unwrap();
        assert_eq!(s.status, KycStatus::Rejected);
        s.submit(cid("d"), Timestamp::now()).unwrap();
        assert_eq!(s.status, KycStatus::Pending);
        assert_eq!(s.identity_pointer, Some(cid("d")));
        assert_eq!(s.submissions, 4);
    }

    #[test]
    fn liveness_steps_are_recorded_while_pending() {
        let mut s = Subject::new(UserId::new());
        assert!(s.record_liveness_step(1, cid("f"), Timestamp::now()).is_err());

        let mut s = pending();
        assert_eq!(
            s.record_liveness_step(0, cid("f"), Timestamp::now()),
            Err(TransitionError::InvalidLivenessStep(0))
        );
        s.record_liveness_step(1, cid("f1"), Timestamp::now()).unwrap();
        s.record_liveness_step(2, cid("f2"), Timestamp::now()).unwrap();
        s.record_liveness_step(2, cid("f2b"), Timestamp::now()).unwrap();
        assert_eq!(s.checklist.liveness_steps(), 2);
        assert_eq!(
            s.checklist.get("liveness-step-2").and_then(|e| e.cid.clone()),
            Some(cid("f2b"))
        );
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&KycStatus::NotStarted).unwrap(), "\"not_started\"");
        assert_eq!(KycStatus::Verified.to_string(), "verified");
    }
}
