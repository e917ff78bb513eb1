//! # In-Memory Ledger
//!
//! A single-node simulated chain. Every confirmed fact lands in its own
//! block, so block heights increase by one per confirmation. Access state
//! is derived from confirmed grant and revoke facts only.
//!
//! ## Warning
//!
//! Provides no durability or finality. Suitable for tests and the demo
//! binary only.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use kyc_core::{Timestamp, TxRef, UserId};
use parking_lot::Mutex;

use crate::error::LedgerError;
use crate::fact::{Confirmation, LedgerFact, PendingTx};
use crate::Ledger;

/// One call to `submit_fact`, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedFact {
    pub nonce: u64,
    pub fact: LedgerFact,
    pub accepted: bool,
}

#[derive(Debug, Default)]
struct LedgerState {
    height: u64,
    used_nonces: HashSet<u64>,
    pending: HashMap<String, LedgerFact>,
    resolved: HashMap<String, Confirmation>,
    confirmed: Vec<(TxRef, u64, LedgerFact)>,
    access: HashSet<(UserId, UserId)>,
    stale_view: HashMap<(UserId, UserId), bool>,
    submissions: Vec<SubmittedFact>,
    fail_submissions: usize,
    fail_confirmations: usize,
    stall_confirmations: usize,
}

/// Process-local ledger with failure injection.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` submissions with a transport error.
    pub fn fail_next_submissions(&self, n: usize) {
        self.state.lock().fail_submissions += n;
    }

    /// Resolve the next `n` confirmations as `Failed`.
    pub fn fail_next_confirmations(&self, n: usize) {
        self.state.lock().fail_confirmations += n;
    }

    /// Make the next `n` confirmation waits never resolve.
    pub fn stall_next_confirmations(&self, n: usize) {
        self.state.lock().stall_confirmations += n;
    }

    /// Pin the answer `has_access` gives for a pair, regardless of the
    /// confirmed facts. Simulates a lagging read replica.
    pub fn set_stale_view(&self, grantor: UserId, subject: UserId, active: bool) {
        self.state.lock().stale_view.insert((grantor, subject), active);
    }

    /// Drop all stale overrides.
    pub fn clear_stale_views(&self) {
        self.state.lock().stale_view.clear();
    }

    /// Every submission, including rejected ones.
    pub fn submissions(&self) -> Vec<SubmittedFact> {
        self.state.lock().submissions.clone()
    }

    /// Facts that reached a block, in block order.
    pub fn confirmed_facts(&self) -> Vec<LedgerFact> {
        self.state.lock().confirmed.iter().map(|(_, _, f)| f.clone()).collect()
    }

    /// Current block height.
    pub fn height(&self) -> u64 {
        self.state.lock().height
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn submit_fact(&self, fact: &LedgerFact, nonce: u64) -> Result<PendingTx, LedgerError> {
        let mut state = self.state.lock();
        if state.fail_submissions > 0 {
            state.fail_submissions -= 1;
            state.submissions.push(SubmittedFact { nonce, fact: fact.clone(), accepted: false });
            return Err(LedgerError::Transport("injected submission failure".into()));
        }
        if !state.used_nonces.insert(nonce) {
            state.submissions.push(SubmittedFact { nonce, fact: fact.clone(), accepted: false });
            return Err(LedgerError::Rejected(format!("nonce {nonce} already used")));
        }
        let id = format!("pending-{nonce:016x}");
        state.pending.insert(id.clone(), fact.clone());
        state.submissions.push(SubmittedFact { nonce, fact: fact.clone(), accepted: true });
        Ok(PendingTx {
            id,
            nonce,
            fact: fact.clone(),
            submitted_at: Timestamp::now(),
        })
    }

    async fn await_confirmation(&self, pending: &PendingTx) -> Result<Confirmation, LedgerError> {
        let stall = {
            let mut state = self.state.lock();
            if let Some(done) = state.resolved.get(&pending.id) {
                return Ok(done.clone());
            }
            let Some(fact) = state.pending.remove(&pending.id) else {
                return Err(LedgerError::Rejected(format!("unknown transaction {}", pending.id)));
            };
            if state.stall_confirmations > 0 {
                state.stall_confirmations -= 1;
                true
            } else if state.fail_confirmations > 0 {
                state.fail_confirmations -= 1;
                let outcome = Confirmation::Failed {
                    reason: "injected confirmation failure".into(),
                };
                state.resolved.insert(pending.id.clone(), outcome.clone());
                return Ok(outcome);
            } else {
                state.height += 1;
                let height = state.height;
                let tx_ref = TxRef::parse(format!("0x{height:08x}{:016x}", pending.nonce))
                    .map_err(|e| LedgerError::Malformed(e.to_string()))?;
                match &fact {
                    LedgerFact::AccessGranted { grantor, subject } => {
                        state.access.insert((*grantor, *subject));
                    }
                    LedgerFact::AccessRevoked { grantor, subject } => {
                        state.access.remove(&(*grantor, *subject));
                    }
                    LedgerFact::IdentityStored { .. } => {}
                }
                state.confirmed.push((tx_ref.clone(), height, fact));
                let outcome = Confirmation::Confirmed {
                    tx_ref,
                    block_height: height,
                };
                state.resolved.insert(pending.id.clone(), outcome.clone());
                return Ok(outcome);
            }
        };
        if stall {
            // The dropped transaction never lands; the caller's timeout decides.
            std::future::pending::<()>().await;
        }
        Err(LedgerError::Transport("confirmation stream closed".into()))
    }

    async fn has_access(&self, grantor: &UserId, subject: &UserId) -> Result<bool, LedgerError> {
        let state = self.state.lock();
        if let Some(active) = state.stale_view.get(&(*grantor, *subject)) {
            return Ok(*active);
        }
        Ok(state.access.contains(&(*grantor, *subject)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nonce_reuse_is_rejected() {
        let ledger = InMemoryLedger::new();
        let fact = LedgerFact::AccessGranted { grantor: UserId::new(), subject: UserId::new() };
        ledger.submit_fact(&fact, 9).await.unwrap();
        assert!(matches!(ledger.submit_fact(&fact, 9).await, Err(LedgerError::Rejected(_))));
    }

    #[tokio::test]
    async fn confirmation_is_stable_and_heights_increase() {
        let ledger = InMemoryLedger::new();
        let fact = LedgerFact::AccessGranted { grantor: UserId::new(), subject: UserId::new() };
        let a = ledger.submit_fact(&fact, 1).await.unwrap();
        let b = ledger.submit_fact(&fact, 2).await.unwrap();
        let first = ledger.await_confirmation(&a).await.unwrap();
        assert_eq!(ledger.await_confirmation(&a).await.unwrap(), first);
        let second = ledger.await_confirmation(&b).await.unwrap();
        match (first, second) {
            (
                Confirmation::Confirmed { block_height: h1, .. },
                Confirmation::Confirmed { block_height: h2, .. },
            ) => assert!(h2 > h1),
            other => panic!("expected two confirmations, got {other:?}"),
        }
        assert_eq!(ledger.height(), 2);
    }

    #[tokio::test]
    async fn stale_view_overrides_confirmed_state() {
        let ledger = InMemoryLedger::new();
        let (org, subject) = (UserId::new(), UserId::new());
        ledger.set_stale_view(org, subject, true);
        assert!(ledger.has_access(&org, &subject).await.unwrap());
        ledger.clear_stale_views();
        assert!(!ledger.has_access(&org, &subject).await.unwrap());
    }
}
