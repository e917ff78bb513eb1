mod common;

use common::{identity, Harness};
use kyc_audit::{AuditAction, AuditEvent, AuditFilter, Pagination};
use kyc_core::{Timestamp, UserId};
use kyc_engine::ErrorKind;
use kyc_ledger::LedgerFact;
use kyc_state::GrantStatus;

fn granted_entries(h: &Harness, subject: &UserId) -> usize {
    h.trail
        .entries(subject)
        .iter()
        .filter(|e| e.action() == AuditAction::AccessGranted)
        .count()
}

#[tokio::test]
async fn grant_is_idempotent() {
    let h = Harness::new();
    let s = h.subject();
    let o = h.organization();

    let first = h.engine.grant(o, s).await.unwrap();
    let second = h.engine.grant(o, s).await.unwrap();
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.grant, second.grant);

    assert_eq!(granted_entries(&h, &s), 1);
    assert_eq!(h.ledger.confirmed_facts().len(), 1);
    assert_eq!(h.engine.active_grants(s, s).await.unwrap().len(), 1);
}

#[tokio::test]
async fn revoke_then_grant_keeps_both_records() {
    let h = Harness::new();
    let s = h.subject();
    let o = h.organization();

    let first = h.engine.grant(o, s).await.unwrap().grant;
    let revoked = h.engine.revoke(o, s).await.unwrap();
    assert_eq!(revoked.id, first.id);
    assert_eq!(revoked.status, GrantStatus::Revoked);
    assert!(revoked.revoked_tx.is_some());
    assert!(!h.engine.check(o, s).await.unwrap());

    let second = h.engine.grant(o, s).await.unwrap().grant;
    assert_ne!(second.id, first.id);

    let history = h.engine.grant_history(s, s).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, GrantStatus::Revoked);
    assert_eq!(history[1].status, GrantStatus::Active);
    assert_eq!(h.engine.active_grants(o, s).await.unwrap(), vec![second]);
    assert!(h.engine.check(o, s).await.unwrap());

    let facts = h.ledger.confirmed_facts();
    assert_eq!(
        facts,
        vec![
            LedgerFact::AccessGranted { grantor: o, subject: s },
            LedgerFact::AccessRevoked { grantor: o, subject: s },
            LedgerFact::AccessGranted { grantor: o, subject: s },
        ]
    );
}

#[tokio::test]
async fn revoke_without_an_active_grant() {
    let h = Harness::new();
    let s = h.subject();
    let o = h.organization();

    let err = h.engine.revoke(o, s).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoActiveGrant);
    assert!(h.ledger.submissions().is_empty());
    assert!(h.trail.is_empty());
}

#[tokio::test]
async fn grantor_role_and_subject_are_validated() {
    let h = Harness::new();
    let s = h.subject();
    let other_subject = h.subject();
    let o = h.organization();

    let err = h.engine.grant(other_subject, s).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);

    let err = h.engine.grant(UserId::new(), s).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);

    let err = h.engine.grant(o, UserId::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SubjectNotFound);

    // An organization id is not a subject.
    let err = h.engine.grant(o, h.organization()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SubjectNotFound);

    assert!(h.engine.grant(h.operator, s).await.unwrap().created);
    assert_eq!(h.ledger.submissions().len(), 1);
}

#[tokio::test]
async fn check_rules() {
    let h = Harness::new();
    let s = h.subject();
    let o = h.organization();
    let stranger = h.subject();

    assert!(h.engine.check(s, s).await.unwrap());
    assert!(h.engine.check(h.operator, s).await.unwrap());
    assert!(!h.engine.check(o, s).await.unwrap());
    assert!(!h.engine.check(stranger, s).await.unwrap());

    h.engine.grant(o, s).await.unwrap();
    assert!(h.engine.check(o, s).await.unwrap());
    // Grants are directional.
    assert!(!h.engine.check(s, o).await.unwrap());
}

#[tokio::test]
async fn access_list_visibility() {
    let h = Harness::new();
    let s = h.subject();
    let o = h.organization();
    let stranger = h.subject();
    h.engine.grant(o, s).await.unwrap();

    assert_eq!(h.engine.active_grants(s, s).await.unwrap().len(), 1);
    assert_eq!(h.engine.active_grants(o, s).await.unwrap().len(), 1);
    assert_eq!(h.engine.active_grants(h.operator, s).await.unwrap().len(), 1);
    let err = h.engine.active_grants(stranger, s).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
}

#[tokio::test]
async fn history_is_newest_first_filtered_and_paginated() {
    let h = Harness::new();
    let s = h.subject();
    let o = h.organization();
    let stranger = h.subject();

    h.engine.submit_identity(s, identity("Jo Hart")).await.unwrap();
    h.engine.grant(o, s).await.unwrap();
    h.engine.revoke(o, s).await.unwrap();
    h.engine.grant(o, s).await.unwrap();

    let page = h
        .engine
        .history(s, s, AuditFilter::default(), Pagination::new(1, 3))
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.pages, 2);
    assert_eq!(page.entries.len(), 3);
    assert_eq!(page.entries[0].sequence, 4);
    assert_eq!(page.entries[2].sequence, 2);

    let page = h
        .engine
        .history(s, s, AuditFilter::default(), Pagination::new(2, 3))
        .await
        .unwrap();
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].action(), AuditAction::IdentitySubmitted);

    let grants_only = h
        .engine
        .history(
            o,
            s,
            AuditFilter::default()
                .actions([AuditAction::AccessGranted])
                .oldest_first(),
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(grants_only.total, 2);
    assert!(grants_only.entries.iter().all(|e| e.actor == o));
    assert!(matches!(
        grants_only.entries[0].event,
        AuditEvent::AccessGranted { grantor, .. } if grantor == o
    ));
    assert!(grants_only.entries[0].tx_ref.is_some());

    let err = h
        .engine
        .history(stranger, s, AuditFilter::default(), Pagination::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
}

#[tokio::test]
async fn audit_between_is_operator_only() {
    let h = Harness::new();
    let a = h.subject();
    let b = h.subject();
    let o = h.organization();
    let from = Timestamp::now();

    h.engine.submit_identity(a, identity("Kim")).await.unwrap();
    h.engine.submit_identity(b, identity("Lou")).await.unwrap();
    h.engine.grant(o, a).await.unwrap();

    let to = Timestamp::from_epoch_secs(Timestamp::now().epoch_secs() + 1).unwrap();
    let entries = h.engine.audit_between(h.operator, from, to).await.unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let err = h.engine.audit_between(o, from, to).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAuthorized);
}
