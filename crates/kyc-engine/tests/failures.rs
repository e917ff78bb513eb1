mod common;

use common::{identity, Harness};
use kyc_audit::{AuditAction, AuditEvent, Durability};
use kyc_engine::{ErrorKind, VerificationStage, RETRY_LATER};
use kyc_ledger::{FactKind, LedgerFact};
use kyc_state::KycStatus;
use kyc_store::StoreError;

#[tokio::test]
async fn ledger_failure_leaves_a_new_subject_untouched() {
    let h = Harness::new();
    let s = h.subject();
    h.ledger.fail_next_submissions(3);

    let err = h.engine.submit_identity(s, identity("Max Uhl")).await.unwrap_err();
    assert_eq!(err.stage(), Some(VerificationStage::Ledger));
    assert_eq!(err.kind(), ErrorKind::Ledger);
    assert!(err.is_retryable());
    assert_eq!(err.public_message(), RETRY_LATER);

    let subject = h.engine.subject(s).await.unwrap();
    assert_eq!(subject.status, KycStatus::NotStarted);
    assert!(subject.identity_pointer.is_none());

    let entries = h.trail.entries(&s);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].durability, Durability::Failed);
    assert!(matches!(
        &entries[0].event,
        AuditEvent::OperationFailed { attempted: AuditAction::IdentitySubmitted, stage, .. } if stage == "ledger"
    ));
    assert_eq!(h.trail.reconstruct(&s).unwrap().subject, subject);
}

#[tokio::test]
async fn failed_confirmations_keep_the_previous_pointer() {
    let h = Harness::new();
    let s = h.subject();
    let first = h.engine.submit_identity(s, identity("Nia Falk")).await.unwrap();

    h.ledger.fail_next_confirmations(3);
    let err = h.engine.submit_identity(s, identity("Nia Falk-Ros")).await.unwrap_err();
    assert_eq!(err.stage(), Some(VerificationStage::Ledger));

    let subject = h.engine.subject(s).await.unwrap();
    assert_eq!(subject.status, KycStatus::Pending);
    assert_eq!(subject.identity_pointer.as_ref(), Some(&first.manifest));
    assert_eq!(subject.submissions, 1);

    // Each retry went out under a fresh nonce.
    let attempts: Vec<_> = h
        .ledger
        .submissions()
        .into_iter()
        .filter(|f| f.accepted)
        .map(|f| f.nonce)
        .collect();
    assert_eq!(attempts.len(), 4);
    let mut unique = attempts.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), attempts.len());

    let view = h.engine.get_identity(s, s).await.unwrap();
    assert_eq!(view.identity.full_name, "Nia Falk");
}

#[tokio::test]
async fn store_retries_then_commits_once() {
    let h = Harness::new();
    let s = h.subject();
    h.store.fail_next_puts(2);

    let receipt = h.engine.submit_identity(s, identity("Ola Berg")).await.unwrap();
    assert_eq!(h.store.put_attempts(), 3);

    let stored: Vec<_> = h
        .ledger
        .submissions()
        .into_iter()
        .filter(|f| f.fact.kind() == FactKind::IdentityStored)
        .collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored[0].fact,
        LedgerFact::IdentityStored {
            subject: s,
            cid: receipt.manifest.clone(),
        }
    );

    let entries = h.trail.entries(&s);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].durability, Durability::Confirmed);
    assert_eq!(entries[0].cid.as_ref(), Some(&receipt.manifest));
    assert_eq!(entries[0].tx_ref.as_ref(), Some(&receipt.tx_ref));

    let subject = h.engine.subject(s).await.unwrap();
    assert_eq!(subject.identity_pointer, Some(receipt.manifest));
}

#[tokio::test]
async fn exhausted_store_never_reaches_the_ledger() {
    let h = Harness::new();
    let s = h.subject();
    for _ in 0..4 {
        h.store
            .inject_put_failure(StoreError::QuotaExceeded("rate limited".into()));
    }

    let err = h.engine.submit_identity(s, identity("Pia Sand")).await.unwrap_err();
    assert_eq!(err.stage(), Some(VerificationStage::Store));
    assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
    assert_eq!(h.store.put_attempts(), 4);
    assert!(h.ledger.submissions().is_empty());
    assert_eq!(h.engine.status(s).await.unwrap(), KycStatus::NotStarted);
}

#[tokio::test]
async fn failed_grant_creates_no_grant() {
    let h = Harness::new();
    let s = h.subject();
    let o = h.organization();
    h.ledger.fail_next_submissions(3);

    let err = h.engine.grant(o, s).await.unwrap_err();
    assert_eq!(err.stage(), Some(VerificationStage::Ledger));
    assert!(!h.engine.check(o, s).await.unwrap());
    assert!(h.engine.active_grants(s, s).await.unwrap().is_empty());

    let entries = h.trail.entries(&s);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor, o);
    assert!(!entries[0].is_effective());

    // The next attempt succeeds and the failed entry does not block it.
    assert!(h.engine.grant(o, s).await.unwrap().created);
    assert_eq!(h.trail.entries(&s).len(), 2);
    assert_eq!(h.trail.verify_chain(&s).unwrap(), 2);
}

#[tokio::test]
async fn failures_are_not_journaled_when_disabled() {
    let mut config = kyc_engine::EngineConfig::fast();
    config.audit_failures = false;
    let h = Harness::with_config(config);
    let s = h.subject();
    h.ledger.fail_next_submissions(3);

    assert!(h.engine.submit_identity(s, identity("Quin")).await.is_err());
    assert!(h.trail.is_empty());
}

#[tokio::test]
async fn missing_manifest_is_an_integrity_violation() {
    let h = Harness::new();
    let s = h.subject();
    let receipt = h.engine.submit_identity(s, identity("Rae Cole")).await.unwrap();
    assert!(h.store.evict(&receipt.manifest));

    let err = h.engine.get_identity(h.operator, s).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityViolation);
    assert!(!err.is_retryable());
    assert_eq!(err.public_message(), RETRY_LATER);
    assert_eq!(h.engine.status(s).await.unwrap(), KycStatus::Pending);
}

#[tokio::test]
async fn transient_read_failures_are_retried() {
    let h = Harness::new();
    let s = h.subject();
    h.engine.submit_identity(s, identity("Sol Vik")).await.unwrap();
    h.store.fail_next_gets(2);

    let view = h.engine.get_identity(s, s).await.unwrap();
    assert_eq!(view.identity.full_name, "Sol Vik");
    assert_eq!(h.store.get_attempts(), 3);
}
