//! # Access Grant Manager
//!
//! Owns the organization → subject read relation. Grants and revocations
//! are anchored on the ledger before they are journaled; `check` answers
//! from the local projection, which is folded from the audit trail and
//! therefore never behind it. The ledger's own view may lag, so a
//! grant-based answer is compared against it in the background and a
//! disagreement triggers [`AccessGrantManager::reconcile`].

use std::sync::atomic::Ordering;
use std::sync::Arc;

use kyc_audit::{AuditAction, AuditEntry, AuditEvent, AuditFilter, AuditPage, AuditRecord, Pagination};
use kyc_core::{GrantId, Timestamp, UserId};
use kyc_ledger::LedgerFact;
use kyc_state::AccessGrant;

use crate::directory::Role;
use crate::engine_core::EngineCore;
use crate::error::{KycError, VerificationStage};
use crate::types::{GrantReceipt, ReconcileReport};

/// Grant, revoke and check operations.
#[derive(Clone)]
pub struct AccessGrantManager {
    core: Arc<EngineCore>,
}

impl AccessGrantManager {
    pub(crate) fn new(core: Arc<EngineCore>) -> Self {
        Self { core }
    }

    /// Give `grantor` read access to `subject`.
    ///
    /// Idempotent: if the grantor already holds an active grant it is
    /// returned with `created == false` and nothing is written.
    pub async fn grant(&self, grantor: UserId, subject: UserId) -> Result<GrantReceipt, KycError> {
        self.core.require_role(&grantor, Role::Organization).await?;
        self.core.require_subject(&subject).await?;
        self.core
            .run_exclusive(subject, move |core| async move {
                let result = grant_locked(&core, grantor, subject).await;
                if let Err(e) = &result {
                    if e.stage().is_some() {
                        core.record_failure(subject, grantor, AuditAction::AccessGranted, e).await;
                    }
                }
                result
            })
            .await
    }

    /// Withdraw `grantor`'s active grant on `subject`.
    pub async fn revoke(&self, grantor: UserId, subject: UserId) -> Result<AccessGrant, KycError> {
        self.core.require_role(&grantor, Role::Organization).await?;
        self.core.require_subject(&subject).await?;
        self.core
            .run_exclusive(subject, move |core| async move {
                let result = revoke_locked(&core, grantor, subject).await;
                if let Err(e) = &result {
                    if e.stage().is_some() {
                        core.record_failure(subject, grantor, AuditAction::AccessRevoked, e).await;
                    }
                }
                result
            })
            .await
    }

    /// May `requester` read `subject`'s identity?
    pub async fn check(&self, requester: UserId, subject: UserId) -> Result<bool, KycError> {
        check_access(&self.core, &requester, &subject).await
    }

    /// The subject's active grants, in issue order.
    pub async fn active_grants(&self, requester: UserId, subject: UserId) -> Result<Vec<AccessGrant>, KycError> {
        self.core.require_subject(&subject).await?;
        self.core.require_reader(&requester, &subject).await?;
        let projection = self.core.projection(&subject)?;
        Ok(projection.grants.active().cloned().collect())
    }

    /// Every grant ever issued on the subject, revoked ones included.
    pub async fn grant_history(&self, requester: UserId, subject: UserId) -> Result<Vec<AccessGrant>, KycError> {
        self.core.require_subject(&subject).await?;
        self.core.require_reader(&requester, &subject).await?;
        Ok(self.core.projection(&subject)?.grants.history().to_vec())
    }

    /// Filtered, paginated audit history for one subject.
    pub async fn history(
        &self,
        requester: UserId,
        subject: UserId,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, KycError> {
        self.core.require_subject(&subject).await?;
        self.core.require_reader(&requester, &subject).await?;
        Ok(self.core.trail.list_for_subject(&subject, &filter, pagination))
    }

    /// Audit entries across all subjects in `[from, to]`. Operators only.
    pub async fn audit_between(
        &self,
        operator: UserId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<AuditEntry>, KycError> {
        self.core.require_role(&operator, Role::Operator).await?;
        Ok(self.core.trail.list_between(from, to))
    }

    /// Rebuild `subject`'s projection from the audit trail and replace the
    /// cached copy.
    pub async fn reconcile(&self, subject: UserId) -> Result<ReconcileReport, KycError> {
        reconcile(&self.core, subject).await
    }
}

// ─── Check ───────────────────────────────────────────────────────────

pub(crate) async fn check_access(
    core: &Arc<EngineCore>,
    requester: &UserId,
    subject: &UserId,
) -> Result<bool, KycError> {
    if requester == subject {
        return Ok(true);
    }
    if core.role(requester).await == Some(Role::Operator) {
        return Ok(true);
    }
    let granted = core.projection(subject)?.grants.is_active(requester);
    if granted && core.config.reconcile_on_check && core.begin_comparison(*requester, *subject) {
        spawn_ledger_comparison(Arc::clone(core), *requester, *subject);
    }
    Ok(granted)
}

/// Ask the ledger whether it agrees with a local grant and reconcile if
/// it does not. The local answer has already been returned. At most one
/// comparison runs per pair; checks that arrive meanwhile do not queue
/// another.
fn spawn_ledger_comparison(core: Arc<EngineCore>, grantor: UserId, subject: UserId) {
    tokio::spawn(async move {
        compare_with_ledger(&core, grantor, subject).await;
        core.end_comparison(grantor, subject);
    });
}

async fn compare_with_ledger(core: &Arc<EngineCore>, grantor: UserId, subject: UserId) {
    match core.ledger.has_access(&grantor, &subject).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(
                %grantor,
                %subject,
                "ledger reports no access where the local projection holds an active grant"
            );
            metrics::counter!("kyc_ledger_disagreements_total").increment(1);
            core.record_ledger_disagreement();
            if let Err(e) = reconcile(core, subject).await {
                tracing::warn!(%subject, "reconciliation after ledger disagreement failed: {e}");
            }
        }
        Err(e) => {
            tracing::debug!(%grantor, %subject, "ledger access comparison skipped: {e}");
        }
    }
}

pub(crate) async fn reconcile(core: &Arc<EngineCore>, subject: UserId) -> Result<ReconcileReport, KycError> {
    core.run_exclusive(subject, move |core| async move {
        let rebuilt = core.trail.reconstruct(&subject)?;
        let diverged = core
            .cached_projection(&subject)
            .is_some_and(|cached| cached != rebuilt);
        if diverged {
            tracing::warn!(
                %subject,
                last_sequence = rebuilt.last_sequence,
                "cached projection diverged from the audit trail, replacing it"
            );
            metrics::counter!("kyc_projection_divergence_total").increment(1);
            core.projection_repairs.fetch_add(1, Ordering::Relaxed);
        }
        let last_sequence = rebuilt.last_sequence;
        if last_sequence > 0 {
            core.commit(rebuilt);
        }
        Ok(ReconcileReport {
            subject,
            diverged,
            last_sequence,
        })
    })
    .await
}

// ─── Locked sections ─────────────────────────────────────────────────

async fn grant_locked(core: &EngineCore, grantor: UserId, subject: UserId) -> Result<GrantReceipt, KycError> {
    let current = core.projection(&subject)?;
    if let Some(existing) = current.grants.active_for(&grantor) {
        tracing::debug!(%grantor, %subject, grant = %existing.id, "grant already active");
        return Ok(GrantReceipt {
            grant: existing.clone(),
            created: false,
        });
    }

    let receipt = core
        .ledger
        .record(&LedgerFact::AccessGranted { grantor, subject })
        .await
        .map_err(|e| KycError::verification(VerificationStage::Ledger, e))?;
    let at = Timestamp::now();
    let id = GrantId::new();

    let mut next = current.clone();
    let grant = next
        .grants
        .grant(id, grantor, subject, receipt.tx_ref.clone(), at)?
        .clone();
    let record = AuditRecord::confirmed(subject, grantor, at, AuditEvent::AccessGranted { grant_id: id, grantor })
        .with_ledger(receipt.tx_ref.clone(), receipt.block_height);
    core.append_and_commit(next, record)
        .await
        .map_err(|e| KycError::verification(VerificationStage::Audit, e))?;

    tracing::info!(%grantor, %subject, grant = %id, tx_ref = %receipt.tx_ref, "access granted");
    Ok(GrantReceipt { grant, created: true })
}

async fn revoke_locked(core: &EngineCore, grantor: UserId, subject: UserId) -> Result<AccessGrant, KycError> {
    let current = core.projection(&subject)?;
    let active_id = current
        .grants
        .active_for(&grantor)
        .map(|g| g.id)
        .ok_or(KycError::NoActiveGrant { grantor, subject })?;

    let receipt = core
        .ledger
        .record(&LedgerFact::AccessRevoked { grantor, subject })
        .await
        .map_err(|e| KycError::verification(VerificationStage::Ledger, e))?;
    let at = Timestamp::now();

    let mut next = current.clone();
    let revoked = next.grants.revoke(&grantor, receipt.tx_ref.clone(), at)?.clone();
    let record = AuditRecord::confirmed(
        subject,
        grantor,
        at,
        AuditEvent::AccessRevoked {
            grant_id: active_id,
            grantor,
        },
    )
    .with_ledger(receipt.tx_ref.clone(), receipt.block_height);
    core.append_and_commit(next, record)
        .await
        .map_err(|e| KycError::verification(VerificationStage::Audit, e))?;

    tracing::info!(%grantor, %subject, grant = %active_id, tx_ref = %receipt.tx_ref, "access revoked");
    Ok(revoked)
}
