//! # Engine Core
//!
//! Shared dependencies plus the two disciplines every operation follows:
//!
//! - **Projection cache.** A subject's [`SubjectProjection`] is cached
//!   after first use and otherwise rebuilt from the audit trail. Writers
//!   replace it only after their audit entry is appended.
//! - **Exclusive mutations.** [`EngineCore::run_exclusive`] takes the
//!   subject lock and runs the mutation in a spawned task that owns the
//!   guard. Dropping the caller's future does not cancel the task, so an
//!   issued store put or ledger submission always runs to commit or to
//!   explicit failure before the lock is released.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kyc_audit::{AuditAction, AuditEntry, AuditEvent, AuditRecord, AuditTrail, Durability, SubjectProjection};
use kyc_core::{Timestamp, UserId};
use kyc_crypto::Envelope;
use kyc_ledger::LedgerClient;
use kyc_store::StoreClient;
use parking_lot::{Mutex, RwLock};

use crate::config::EngineConfig;
use crate::directory::{Role, RoleDirectory};
use crate::error::KycError;
use crate::locks::SubjectLocks;

pub(crate) struct EngineCore {
    pub(crate) config: EngineConfig,
    pub(crate) envelope: Envelope,
    pub(crate) store: StoreClient,
    pub(crate) ledger: LedgerClient,
    pub(crate) directory: Arc<dyn RoleDirectory>,
    pub(crate) trail: Arc<AuditTrail>,
    pub(crate) locks: SubjectLocks,
    projections: RwLock<HashMap<UserId, SubjectProjection>>,
    /// (grantor, subject) pairs with a ledger comparison in flight.
    comparisons: Mutex<HashSet<(UserId, UserId)>>,
    pub(crate) ledger_disagreements: AtomicU64,
    pub(crate) projection_repairs: AtomicU64,
}

impl EngineCore {
    pub(crate) fn new(
        config: EngineConfig,
        envelope: Envelope,
        store: StoreClient,
        ledger: LedgerClient,
        directory: Arc<dyn RoleDirectory>,
        trail: Arc<AuditTrail>,
    ) -> Self {
        Self {
            config,
            envelope,
            store,
            ledger,
            directory,
            trail,
            locks: SubjectLocks::new(),
            projections: RwLock::new(HashMap::new()),
            comparisons: Mutex::new(HashSet::new()),
            ledger_disagreements: AtomicU64::new(0),
            projection_repairs: AtomicU64::new(0),
        }
    }

    // ── Projections ─────────────────────────────────────────────────

    /// Current projection for `subject`: cached, or folded from the trail.
    pub(crate) fn projection(&self, subject: &UserId) -> Result<SubjectProjection, KycError> {
        if let Some(p) = self.projections.read().get(subject) {
            return Ok(p.clone());
        }
        let rebuilt = self.trail.reconstruct(subject)?;
        if rebuilt.last_sequence > 0 {
            self.projections
                .write()
                .entry(*subject)
                .or_insert_with(|| rebuilt.clone());
        }
        Ok(rebuilt)
    }

    pub(crate) fn cached_projection(&self, subject: &UserId) -> Option<SubjectProjection> {
        self.projections.read().get(subject).cloned()
    }

    /// Replace the cached projection. Callers hold the subject lock.
    pub(crate) fn commit(&self, projection: SubjectProjection) {
        self.projections
            .write()
            .insert(projection.subject.id, projection);
    }

    /// Every subject with history, cached or in the trail.
    pub(crate) fn known_subjects(&self) -> Vec<UserId> {
        let mut subjects = self.trail.subjects();
        subjects.extend(self.projections.read().keys().copied());
        subjects.sort();
        subjects.dedup();
        subjects
    }

    // ── Roles ───────────────────────────────────────────────────────

    pub(crate) async fn role(&self, user: &UserId) -> Option<Role> {
        self.directory.resolve_role(user).await
    }

    /// The id must belong to a registered subject.
    pub(crate) async fn require_subject(&self, subject: &UserId) -> Result<(), KycError> {
        match self.role(subject).await {
            Some(Role::Subject) => Ok(()),
            _ => Err(KycError::SubjectNotFound(*subject)),
        }
    }

    /// The principal must hold at least `minimum`.
    pub(crate) async fn require_role(&self, principal: &UserId, minimum: Role) -> Result<Role, KycError> {
        match self.role(principal).await {
            Some(role) if role >= minimum => Ok(role),
            Some(role) => Err(KycError::NotAuthorized {
                principal: *principal,
                reason: format!("role '{minimum}' required, caller has '{role}'"),
            }),
            None => Err(KycError::NotAuthorized {
                principal: *principal,
                reason: "unknown principal".into(),
            }),
        }
    }

    /// Subject itself, organizations and operators may read a subject's
    /// access list and history.
    pub(crate) async fn require_reader(&self, requester: &UserId, subject: &UserId) -> Result<(), KycError> {
        if requester == subject {
            return Ok(());
        }
        self.require_role(requester, Role::Organization).await.map(|_| ())
    }

    // ── Exclusive sections ──────────────────────────────────────────

    /// Run `op` while holding `subject`'s lock, detached from the caller.
    pub(crate) async fn run_exclusive<T, F, Fut>(self: &Arc<Self>, subject: UserId, op: F) -> Result<T, KycError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<EngineCore>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, KycError>> + Send + 'static,
    {
        let guard = self.locks.acquire(subject).await;
        let core = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = op(core).await;
            drop(guard);
            result
        });
        task.await
            .map_err(|e| KycError::Internal(format!("mutation task for {subject} did not complete: {e}")))?
    }

    /// Append `record` to the trail. A journaled trail writes and syncs
    /// on the blocking pool.
    pub(crate) async fn append_entry(&self, record: AuditRecord) -> Result<AuditEntry, KycError> {
        if !self.trail.is_journaled() {
            return Ok(self.trail.append(record)?);
        }
        let trail = Arc::clone(&self.trail);
        let entry = tokio::task::spawn_blocking(move || trail.append(record))
            .await
            .map_err(|e| KycError::Internal(format!("audit append task did not complete: {e}")))??;
        Ok(entry)
    }

    /// Record an aborted mutation. Called with the subject lock held.
    pub(crate) async fn record_failure(
        &self,
        subject: UserId,
        actor: UserId,
        attempted: AuditAction,
        err: &KycError,
    ) {
        let stage = err
            .stage()
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "validation".to_string());
        tracing::warn!(
            %subject,
            %actor,
            action = %attempted,
            stage = %stage,
            "operation aborted without state change: {err}"
        );
        metrics::counter!("kyc_operation_failures_total", "stage" => stage.clone()).increment(1);

        if !self.config.audit_failures {
            return;
        }
        let record = AuditRecord {
            durability: Durability::Failed,
            ..AuditRecord::local(
                subject,
                actor,
                Timestamp::now(),
                AuditEvent::OperationFailed {
                    attempted,
                    stage,
                    error: err.to_string(),
                },
            )
        };
        match self.append_entry(record).await {
            Ok(entry) => {
                if let Some(mut cached) = self.cached_projection(&subject) {
                    cached.last_sequence = entry.sequence;
                    self.commit(cached);
                }
            }
            Err(audit_err) => {
                tracing::error!(%subject, "failed to journal aborted operation: {audit_err}");
            }
        }
    }

    /// Append the entry for a committed transition, then publish the new
    /// projection. Called with the subject lock held.
    pub(crate) async fn append_and_commit(
        &self,
        mut next: SubjectProjection,
        record: AuditRecord,
    ) -> Result<SubjectProjection, KycError> {
        let action = record.event.action();
        let entry = self.append_entry(record).await?;
        next.last_sequence = entry.sequence;
        self.commit(next.clone());
        metrics::counter!("kyc_transitions_total", "action" => action.as_str()).increment(1);
        Ok(next)
    }

    /// Claim the comparison slot for a pair. False if one is running.
    pub(crate) fn begin_comparison(&self, grantor: UserId, subject: UserId) -> bool {
        self.comparisons.lock().insert((grantor, subject))
    }

    pub(crate) fn end_comparison(&self, grantor: UserId, subject: UserId) {
        self.comparisons.lock().remove(&(grantor, subject));
    }

    pub(crate) fn record_ledger_disagreement(&self) {
        self.ledger_disagreements.fetch_add(1, Ordering::Relaxed);
    }
}
