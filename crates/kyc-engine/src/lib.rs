//! # kyc-engine — Verification Lifecycle and Access Control
//!
//! Coordinates the sealed content store, the transactional ledger and the
//! audit trail into one consistent view per subject.
//!
//! ## Components
//!
//! - **Verification** (`verification.rs`): identity submission, document
//!   upload, liveness capture, operator review, identity read-back.
//! - **Access** (`access.rs`): grant, revoke, check, access list, history
//!   and projection reconciliation.
//! - **Directory** (`directory.rs`): role lookup for principals.
//!
//! ## Design
//!
//! The audit trail is the system of record. Every committed mutation
//! appends exactly one entry, after its external effects are durable, and
//! the cached per-subject projection is the fold of those entries.
//! Mutations on one subject are serialized by a keyed lock and run in a
//! task that owns the lock guard, so an abandoned request still finishes
//! or fails cleanly before the next mutation starts. Reads never take the
//! lock and see either the state before or after an in-flight mutation.
//!
//! ## Crate Policy
//!
//! - No ambient state: the key, clients and config are injected through
//!   [`KycEngine::new`].
//! - Component errors are translated into [`KycError`] here; nothing
//!   untyped from the store or ledger crosses this boundary.

pub mod access;
pub mod config;
pub mod directory;
mod engine_core;
pub mod error;
pub mod locks;
pub mod types;
pub mod verification;

use std::sync::Arc;

use kyc_audit::{AuditEntry, AuditFilter, AuditPage, AuditTrail, Pagination};
use kyc_core::{Cid, Timestamp, UserId};
use kyc_crypto::Envelope;
use kyc_ledger::{Ledger, LedgerClient};
use kyc_state::{AccessGrant, DocumentRef, IdentityRecord, KycStatus, Subject};
use kyc_store::{ContentStore, StoreClient};

pub use access::AccessGrantManager;
pub use config::EngineConfig;
pub use directory::{Role, RoleDirectory, StaticDirectory};
pub use error::{ErrorKind, KycError, VerificationStage, RETRY_LATER};
pub use locks::{SubjectGuard, SubjectLocks};
pub use types::{
    DocumentUpload, EngineStats, GrantReceipt, IdentityView, ReconcileReport, SubmitReceipt,
};
pub use verification::VerificationMachine;

use crate::engine_core::EngineCore;

/// The assembled engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct KycEngine {
    verification: VerificationMachine,
    access: AccessGrantManager,
    trail: Arc<AuditTrail>,
}

impl KycEngine {
    /// Wire the engine over its collaborators.
    pub fn new(
        config: EngineConfig,
        envelope: Envelope,
        store: Arc<dyn ContentStore>,
        ledger: Arc<dyn Ledger>,
        directory: Arc<dyn RoleDirectory>,
        trail: Arc<AuditTrail>,
    ) -> Self {
        let store = StoreClient::new(store, config.store_retry);
        let ledger = LedgerClient::new(ledger, config.ledger_retry, config.confirmation_timeout);
        let core = Arc::new(EngineCore::new(
            config,
            envelope,
            store,
            ledger,
            directory,
            Arc::clone(&trail),
        ));
        Self {
            verification: VerificationMachine::new(Arc::clone(&core)),
            access: AccessGrantManager::new(core),
            trail,
        }
    }

    pub fn verification(&self) -> &VerificationMachine {
        &self.verification
    }

    pub fn access(&self) -> &AccessGrantManager {
        &self.access
    }

    pub fn audit_trail(&self) -> &Arc<AuditTrail> {
        &self.trail
    }

    // ── Verification ────────────────────────────────────────────────

    pub async fn submit_identity(&self, subject: UserId, identity: IdentityRecord) -> Result<SubmitReceipt, KycError> {
        self.verification.submit_identity(subject, identity).await
    }

    pub async fn upload_document(&self, subject: UserId, upload: DocumentUpload) -> Result<DocumentRef, KycError> {
        self.verification.upload_document(subject, upload).await
    }

    pub async fn record_liveness_step(&self, subject: UserId, step: u32, frame: Vec<u8>) -> Result<Cid, KycError> {
        self.verification.record_liveness_step(subject, step, frame).await
    }

    pub async fn complete_checklist(
        &self,
        operator: UserId,
        subject: UserId,
        liveness: bool,
        document: bool,
    ) -> Result<KycStatus, KycError> {
        self.verification
            .complete_checklist(operator, subject, liveness, document)
            .await
    }

    pub async fn get_identity(&self, requester: UserId, subject: UserId) -> Result<IdentityView, KycError> {
        self.verification.get_identity(requester, subject).await
    }

    pub async fn get_document(
        &self,
        requester: UserId,
        subject: UserId,
        name: &str,
    ) -> Result<(DocumentRef, Vec<u8>), KycError> {
        self.verification.get_document(requester, subject, name).await
    }

    pub async fn status(&self, subject: UserId) -> Result<KycStatus, KycError> {
        self.verification.status(subject).await
    }

    pub async fn subject(&self, subject: UserId) -> Result<Subject, KycError> {
        self.verification.subject(subject).await
    }

    pub async fn stats(&self, operator: UserId) -> Result<EngineStats, KycError> {
        self.verification.stats(operator).await
    }

    // ── Access ──────────────────────────────────────────────────────

    pub async fn grant(&self, grantor: UserId, subject: UserId) -> Result<GrantReceipt, KycError> {
        self.access.grant(grantor, subject).await
    }

    pub async fn revoke(&self, grantor: UserId, subject: UserId) -> Result<AccessGrant, KycError> {
        self.access.revoke(grantor, subject).await
    }

    pub async fn check(&self, requester: UserId, subject: UserId) -> Result<bool, KycError> {
        self.access.check(requester, subject).await
    }

    pub async fn active_grants(&self, requester: UserId, subject: UserId) -> Result<Vec<AccessGrant>, KycError> {
        self.access.active_grants(requester, subject).await
    }

    pub async fn grant_history(&self, requester: UserId, subject: UserId) -> Result<Vec<AccessGrant>, KycError> {
        self.access.grant_history(requester, subject).await
    }

    pub async fn history(
        &self,
        requester: UserId,
        subject: UserId,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, KycError> {
        self.access.history(requester, subject, filter, pagination).await
    }

    pub async fn audit_between(
        &self,
        operator: UserId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<AuditEntry>, KycError> {
        self.access.audit_between(operator, from, to).await
    }

    pub async fn reconcile(&self, subject: UserId) -> Result<ReconcileReport, KycError> {
        self.access.reconcile(subject).await
    }
}

impl std::fmt::Debug for KycEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KycEngine")
            .field("audit_entries", &self.trail.len())
            .finish_non_exhaustive()
    }
}
