//! # Verification State Machine
//!
//! Drives a subject through `not_started -> pending -> verified | rejected`.
//! Each mutation seals, stores and anchors first, then appends its audit
//! entry, then publishes the new projection. A failure at any external
//! step leaves status, identity pointer and checklist untouched.

use std::sync::Arc;

use kyc_audit::{AuditAction, AuditEvent, AuditRecord};
use kyc_core::{Cid, Timestamp, UserId};
use kyc_crypto::SealedRecord;
use kyc_ledger::LedgerFact;
use kyc_state::{DocumentRef, IdentityManifest, IdentityRecord, KycStatus, Subject};
use kyc_store::StoreError;

use crate::directory::Role;
use crate::engine_core::EngineCore;
use crate::error::{KycError, VerificationStage};
use crate::types::{DocumentUpload, EngineStats, IdentityView, SubmitReceipt};

/// Subject lifecycle operations.
#[derive(Clone)]
pub struct VerificationMachine {
    core: Arc<EngineCore>,
}

impl VerificationMachine {
    pub(crate) fn new(core: Arc<EngineCore>) -> Self {
        Self { core }
    }

    // ── Submit ──────────────────────────────────────────────────────

    /// Seal `identity`, publish a new manifest and point the subject at it.
    ///
    /// Legal from every status; the subject always ends up `pending` with
    /// an empty checklist.
    pub async fn submit_identity(
        &self,
        subject: UserId,
        identity: IdentityRecord,
    ) -> Result<SubmitReceipt, KycError> {
        self.core.require_subject(&subject).await?;
        identity.validate()?;
        self.core
            .run_exclusive(subject, move |core| async move {
                let result = submit_locked(&core, subject, identity).await;
                if let Err(e) = &result {
                    if e.stage().is_some() {
                        core.record_failure(subject, subject, AuditAction::IdentitySubmitted, e).await;
                    }
                }
                result
            })
            .await
    }

    // ── Evidence ────────────────────────────────────────────────────

    /// Seal and store a document, then attach it to the subject. The next
    /// manifest references it.
    pub async fn upload_document(
        &self,
        subject: UserId,
        upload: DocumentUpload,
    ) -> Result<DocumentRef, KycError> {
        self.core.require_subject(&subject).await?;
        if upload.filename.trim().is_empty() {
            return Err(KycError::InvalidInput("document filename is empty".into()));
        }
        if upload.bytes.is_empty() {
            return Err(KycError::InvalidInput(format!("document {} is empty", upload.filename)));
        }
        self.core
            .run_exclusive(subject, move |core| async move {
                let result = upload_locked(&core, subject, upload).await;
                if let Err(e) = &result {
                    if e.stage().is_some() {
                        core.record_failure(subject, subject, AuditAction::DocumentUploaded, e).await;
                    }
                }
                result
            })
            .await
    }

    /// Seal and store one captured liveness frame as checklist entry
    /// `liveness-step-N`. Only legal while `pending`.
    pub async fn record_liveness_step(
        &self,
        subject: UserId,
        step: u32,
        frame: Vec<u8>,
    ) -> Result<Cid, KycError> {
        self.core.require_subject(&subject).await?;
        if frame.is_empty() {
            return Err(KycError::InvalidInput(format!("liveness frame {step} is empty")));
        }
        self.core
            .run_exclusive(subject, move |core| async move {
                let result = liveness_locked(&core, subject, step, frame).await;
                if let Err(e) = &result {
                    if e.stage().is_some() {
                        core.record_failure(subject, subject, AuditAction::LivenessStepSubmitted, e).await;
                    }
                }
                result
            })
            .await
    }

    // ── Review ──────────────────────────────────────────────────────

    /// Record an operator's review. Both checks passing verifies the
    /// subject; anything else rejects it.
    pub async fn complete_checklist(
        &self,
        operator: UserId,
        subject: UserId,
        liveness: bool,
        document: bool,
    ) -> Result<KycStatus, KycError> {
        self.core.require_role(&operator, Role::Operator).await?;
        self.core.require_subject(&subject).await?;
        self.core
            .run_exclusive(subject, move |core| async move {
                let current = core.projection(&subject)?;
                let at = Timestamp::now();
                let mut next = current.clone();
                let outcome = next.subject.complete_checklist(liveness, document, at)?;
                let record = AuditRecord::local(
                    subject,
                    operator,
                    at,
                    AuditEvent::ChecklistCompleted {
                        liveness,
                        document,
                        outcome,
                    },
                );
                core.append_and_commit(next, record)
                    .await
                    .map_err(|e| KycError::verification(VerificationStage::Audit, e))?;
                tracing::info!(%subject, %operator, liveness, document, status = %outcome, "checklist completed");
                Ok(outcome)
            })
            .await
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Decrypt the subject's current identity for an authorized reader.
    pub async fn get_identity(&self, requester: UserId, subject: UserId) -> Result<IdentityView, KycError> {
        authorize_read(&self.core, &requester, &subject).await?;
        let projection = self.core.projection(&subject)?;
        let cid = projection
            .subject
            .identity_pointer
            .clone()
            .ok_or(KycError::SubjectNotFound(subject))?;

        let bytes = fetch_referenced(&self.core, &subject, &cid).await?;
        let manifest = IdentityManifest::from_slice(&bytes).map_err(|e| {
            integrity(&subject, &cid, format!("manifest does not parse: {e}"))
        })?;
        if manifest.subject != subject {
            return Err(integrity(
                &subject,
                &cid,
                format!("manifest belongs to {}", manifest.subject),
            ));
        }
        let identity: IdentityRecord = self
            .core
            .envelope
            .open_json(&manifest.identity, &aad(&subject))
            .map_err(|e| KycError::verification(VerificationStage::Encryption, e))?;

        tracing::debug!(%subject, %requester, %cid, "identity read");
        Ok(IdentityView {
            subject,
            status: projection.subject.status,
            manifest: cid,
            created_at: manifest.created_at,
            identity,
            documents: manifest.documents,
        })
    }

    /// Decrypt one attached document by name.
    pub async fn get_document(
        &self,
        requester: UserId,
        subject: UserId,
        name: &str,
    ) -> Result<(DocumentRef, Vec<u8>), KycError> {
        authorize_read(&self.core, &requester, &subject).await?;
        let projection = self.core.projection(&subject)?;
        let doc = projection
            .subject
            .documents
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| KycError::InvalidInput(format!("{subject} has no document named {name:?}")))?;

        let bytes = fetch_referenced(&self.core, &subject, &doc.cid).await?;
        let sealed: SealedRecord = serde_json::from_slice(&bytes)
            .map_err(|e| integrity(&subject, &doc.cid, format!("sealed document does not parse: {e}")))?;
        let plaintext = self
            .core
            .envelope
            .open(&sealed, &aad(&subject))
            .map_err(|e| KycError::verification(VerificationStage::Encryption, e))?;
        Ok((doc, plaintext))
    }

    pub async fn status(&self, subject: UserId) -> Result<KycStatus, KycError> {
        self.core.require_subject(&subject).await?;
        Ok(self.core.projection(&subject)?.subject.status)
    }

    /// Full subject state: status, pointer, checklist and documents.
    pub async fn subject(&self, subject: UserId) -> Result<Subject, KycError> {
        self.core.require_subject(&subject).await?;
        Ok(self.core.projection(&subject)?.subject)
    }

    /// Counts by status across every subject with history. Operators only.
    pub async fn stats(&self, operator: UserId) -> Result<EngineStats, KycError> {
        self.core.require_role(&operator, Role::Operator).await?;
        let mut stats = EngineStats {
            audit_entries: self.core.trail.len(),
            ledger_disagreements: self.core.ledger_disagreements.load(std::sync::atomic::Ordering::Relaxed),
            projection_repairs: self.core.projection_repairs.load(std::sync::atomic::Ordering::Relaxed),
            ..EngineStats::default()
        };
        for id in self.core.known_subjects() {
            let projection = self.core.projection(&id)?;
            stats.subjects += 1;
            match projection.subject.status {
                KycStatus::NotStarted => stats.not_started += 1,
                KycStatus::Pending => stats.pending += 1,
                KycStatus::Verified => stats.verified += 1,
                KycStatus::Rejected => stats.rejected += 1,
            }
            stats.active_grants += projection.grants.active().count();
        }
        Ok(stats)
    }
}

// ─── Locked sections ─────────────────────────────────────────────────

async fn submit_locked(
    core: &EngineCore,
    subject: UserId,
    identity: IdentityRecord,
) -> Result<SubmitReceipt, KycError> {
    let current = core.projection(&subject)?;
    current.subject.can_submit()?;
    let created_at = Timestamp::now();
    let supersedes = current.subject.identity_pointer.clone();

    let sealed = core
        .envelope
        .seal_json(&identity, &aad(&subject))
        .map_err(|e| KycError::verification(VerificationStage::Encryption, e))?;
    let manifest = IdentityManifest::new(
        subject,
        sealed,
        current.subject.documents.clone(),
        supersedes.clone(),
        created_at,
    );
    let bytes = manifest
        .to_canonical_bytes()
        .map_err(|e| KycError::Internal(format!("manifest canonicalization failed: {e}")))?;

    let cid = core
        .store
        .put(bytes.as_bytes(), &format!("manifest-{}.json", subject.as_uuid()))
        .await
        .map_err(|e| KycError::verification(VerificationStage::Store, e))?;
    let receipt = core
        .ledger
        .record(&LedgerFact::IdentityStored {
            subject,
            cid: cid.clone(),
        })
        .await
        .map_err(|e| KycError::verification(VerificationStage::Ledger, e))?;
    let at = Timestamp::now();

    let mut next = current.clone();
    next.subject.submit(cid.clone(), at)?;
    let record = AuditRecord::confirmed(
        subject,
        subject,
        at,
        AuditEvent::IdentitySubmitted {
            manifest: cid.clone(),
            supersedes: supersedes.clone(),
        },
    )
    .with_ledger(receipt.tx_ref.clone(), receipt.block_height)
    .with_details(serde_json::json!({ "ledger_attempts": receipt.attempts }));
    let committed = core
        .append_and_commit(next, record)
        .await
        .map_err(|e| KycError::verification(VerificationStage::Audit, e))?;

    tracing::info!(
        %subject,
        %cid,
        tx_ref = %receipt.tx_ref,
        block_height = receipt.block_height,
        "identity submitted"
    );
    Ok(SubmitReceipt {
        subject,
        manifest: cid,
        supersedes,
        tx_ref: receipt.tx_ref,
        block_height: receipt.block_height,
        status: committed.subject.status,
        sequence: committed.last_sequence,
    })
}

async fn upload_locked(
    core: &EngineCore,
    subject: UserId,
    upload: DocumentUpload,
) -> Result<DocumentRef, KycError> {
    let current = core.projection(&subject)?;
    current.subject.can_attach_document()?;

    let blob = seal_blob(core, &subject, &upload.bytes)?;
    let cid = core
        .store
        .put(&blob, &upload.filename)
        .await
        .map_err(|e| KycError::verification(VerificationStage::Store, e))?;
    let at = Timestamp::now();

    let doc = DocumentRef {
        name: upload.filename,
        mime_type: upload.mime_type,
        cid: cid.clone(),
        size_bytes: upload.bytes.len() as u64,
        uploaded_at: at,
    };
    let mut next = current.clone();
    next.subject.attach_document(doc.clone())?;
    let record = AuditRecord::confirmed(
        subject,
        subject,
        at,
        AuditEvent::DocumentUploaded { document: doc.clone() },
    );
    core.append_and_commit(next, record)
        .await
        .map_err(|e| KycError::verification(VerificationStage::Audit, e))?;

    tracing::info!(%subject, %cid, name = %doc.name, "document uploaded");
    Ok(doc)
}

async fn liveness_locked(
    core: &EngineCore,
    subject: UserId,
    step: u32,
    frame: Vec<u8>,
) -> Result<Cid, KycError> {
    let current = core.projection(&subject)?;
    current.subject.can_record_liveness_step(step)?;

    let blob = seal_blob(core, &subject, &frame)?;
    let cid = core
        .store
        .put(&blob, &format!("liveness-{}-{step}.bin", subject.as_uuid()))
        .await
        .map_err(|e| KycError::verification(VerificationStage::Store, e))?;
    let at = Timestamp::now();

    let mut next = current.clone();
    next.subject.record_liveness_step(step, cid.clone(), at)?;
    let record = AuditRecord::confirmed(
        subject,
        subject,
        at,
        AuditEvent::LivenessStepSubmitted {
            step,
            evidence: cid.clone(),
        },
    );
    core.append_and_commit(next, record)
        .await
        .map_err(|e| KycError::verification(VerificationStage::Audit, e))?;

    tracing::info!(%subject, %cid, step, "liveness step recorded");
    Ok(cid)
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Sealed blobs are bound to their subject through the associated data.
fn aad(subject: &UserId) -> Vec<u8> {
    subject.to_string().into_bytes()
}

fn seal_blob(core: &EngineCore, subject: &UserId, plaintext: &[u8]) -> Result<Vec<u8>, KycError> {
    let sealed = core
        .envelope
        .seal(plaintext, &aad(subject))
        .map_err(|e| KycError::verification(VerificationStage::Encryption, e))?;
    serde_json::to_vec(&sealed).map_err(|e| KycError::Internal(format!("sealed record encoding failed: {e}")))
}

fn integrity(subject: &UserId, cid: &Cid, reason: String) -> KycError {
    tracing::error!(%subject, %cid, "integrity violation: {reason}");
    KycError::IntegrityViolation {
        subject: *subject,
        cid: cid.clone(),
        reason,
    }
}

async fn authorize_read(core: &Arc<EngineCore>, requester: &UserId, subject: &UserId) -> Result<(), KycError> {
    core.require_subject(subject).await?;
    if !crate::access::check_access(core, requester, subject).await? {
        return Err(KycError::NotAuthorized {
            principal: *requester,
            reason: format!("no access to {subject}"),
        });
    }
    Ok(())
}

/// Fetch a blob the subject references. A missing blob is a dangling
/// reference, never "no data".
async fn fetch_referenced(core: &EngineCore, subject: &UserId, cid: &Cid) -> Result<Vec<u8>, KycError> {
    match core.store.get(cid).await {
        Ok(bytes) => Ok(bytes),
        Err(StoreError::NotFound(_)) => Err(integrity(subject, cid, "referenced blob is missing from the store".into())),
        Err(e) => Err(KycError::verification(VerificationStage::Store, e)),
    }
}
