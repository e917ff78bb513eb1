//! Retrying submit-and-confirm wrapper around a [`Ledger`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kyc_core::{RetryPolicy, TxRef, UserId};

use crate::error::LedgerError;
use crate::fact::{Confirmation, LedgerFact, PendingTx};
use crate::Ledger;

/// Proof that a fact is durable on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub tx_ref: TxRef,
    pub block_height: u64,
    /// Submissions it took, including the successful one.
    pub attempts: u32,
}

/// Ledger handle that turns submit + confirm into a single bounded call.
pub struct LedgerClient {
    inner: Arc<dyn Ledger>,
    retry: RetryPolicy,
    confirmation_timeout: Duration,
    nonce: AtomicU64,
}

impl LedgerClient {
    /// Wrap a ledger. Nonces start at a random offset so two clients
    /// sharing one ledger do not collide.
    pub fn new(inner: Arc<dyn Ledger>, retry: RetryPolicy, confirmation_timeout: Duration) -> Self {
        let (seed, _) = uuid::Uuid::new_v4().as_u64_pair();
        Self {
            inner,
            retry,
            confirmation_timeout,
            nonce: AtomicU64::new(seed >> 16),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    /// Record `fact` and wait for it to become durable.
    ///
    /// Each attempt is a fresh submission under a new nonce. Returns
    /// [`LedgerError::Exhausted`] once the retry budget is spent, or the
    /// first non-retryable error immediately.
    pub async fn record(&self, fact: &LedgerFact) -> Result<LedgerReceipt, LedgerError> {
        let mut attempt = 1;
        loop {
            let nonce = self.next_nonce();
            let err = match self.attempt(fact, nonce).await {
                Ok((tx_ref, block_height)) => {
                    tracing::debug!(kind = %fact.kind(), %tx_ref, block_height, attempt, "ledger fact confirmed");
                    return Ok(LedgerReceipt {
                        tx_ref,
                        block_height,
                        attempts: attempt,
                    });
                }
                Err(e) => e,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            if !self.retry.should_retry(attempt) {
                return Err(LedgerError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            let delay = self.retry.delay_after(attempt);
            tracing::warn!(
                kind = %fact.kind(),
                attempt,
                max_attempts = self.retry.max_attempts,
                "ledger submission failed, resubmitting with fresh nonce in {delay:?}: {err}"
            );
            metrics::counter!(
                "kyc_external_retries_total",
                "dependency" => "ledger",
                "operation" => fact.kind().as_str()
            )
            .increment(1);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(&self, fact: &LedgerFact, nonce: u64) -> Result<(TxRef, u64), LedgerError> {
        let pending: PendingTx = self.inner.submit_fact(fact, nonce).await?;
        let waited =
            tokio::time::timeout(self.confirmation_timeout, self.inner.await_confirmation(&pending)).await;
        match waited {
            Err(_) => Err(LedgerError::ConfirmationTimeout {
                pending_id: pending.id,
                after_ms: u64::try_from(self.confirmation_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            Ok(Err(e)) => Err(e),
            Ok(Ok(Confirmation::Failed { reason })) => Err(LedgerError::ConfirmationFailed {
                pending_id: pending.id,
                reason,
            }),
            Ok(Ok(Confirmation::Confirmed { tx_ref, block_height })) => Ok((tx_ref, block_height)),
        }
    }

    /// Read-only access query. Transport errors are retried; the answer
    /// may still be stale.
    pub async fn has_access(&self, grantor: &UserId, subject: &UserId) -> Result<bool, LedgerError> {
        let mut attempt = 1;
        loop {
            match self.inner.has_access(grantor, subject).await {
                Ok(active) => return Ok(active),
                Err(e) if e.is_retryable() && self.retry.should_retry(attempt) => {
                    tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("retry", &self.retry)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLedger;
    use kyc_core::Cid;

    fn stored(subject: UserId) -> LedgerFact {
        LedgerFact::IdentityStored {
            subject,
            cid: Cid::parse("sha256:00").unwrap(),
        }
    }

    fn client(ledger: &Arc<InMemoryLedger>, attempts: u32) -> LedgerClient {
        LedgerClient::new(ledger.clone(), RetryPolicy::immediate(attempts), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn confirmed_on_first_attempt() {
        let ledger = Arc::new(InMemoryLedger::new());
        let receipt = client(&ledger, 3).record(&stored(UserId::new())).await.unwrap();
        assert_eq!(receipt.attempts, 1);
        assert_eq!(receipt.block_height, 1);
        assert_eq!(ledger.confirmed_facts().len(), 1);
    }

    #[tokio::test]
    async fn failed_confirmation_resubmits_with_fresh_nonce() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.fail_next_confirmations(2);
        let receipt = client(&ledger, 3).record(&stored(UserId::new())).await.unwrap();
        assert_eq!(receipt.attempts, 3);

        let submissions = ledger.submissions();
        assert_eq!(submissions.len(), 3);
        let mut nonces: Vec<u64> = submissions.iter().map(|s| s.nonce).collect();
        nonces.dedup();
        assert_eq!(nonces.len(), 3, "every attempt must use a new nonce");
        assert_eq!(ledger.confirmed_facts().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_after_budget() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.fail_next_confirmations(5);
        let err = client(&ledger, 3).record(&stored(UserId::new())).await.unwrap_err();
        match err {
            LedgerError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, LedgerError::ConfirmationFailed { .. }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert!(ledger.confirmed_facts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_confirmation_times_out_then_retries() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.stall_next_confirmations(1);
        let client = LedgerClient::new(
            ledger.clone(),
            RetryPolicy::immediate(2),
            Duration::from_secs(30),
        );
        let receipt = client.record(&stored(UserId::new())).await.unwrap();
        assert_eq!(receipt.attempts, 2);
        assert_eq!(ledger.confirmed_facts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stall_without_budget_reports_timeout() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.stall_next_confirmations(1);
        let client = LedgerClient::new(ledger.clone(), RetryPolicy::no_retry(), Duration::from_secs(5));
        let err = client.record(&stored(UserId::new())).await.unwrap_err();
        match err {
            LedgerError::Exhausted { last, .. } => {
                assert!(matches!(*last, LedgerError::ConfirmationTimeout { after_ms: 5000, .. }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn submission_transport_errors_are_retried() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.fail_next_submissions(1);
        let receipt = client(&ledger, 2).record(&stored(UserId::new())).await.unwrap();
        assert_eq!(receipt.attempts, 2);
    }

    #[tokio::test]
    async fn has_access_follows_confirmed_facts() {
        let ledger = Arc::new(InMemoryLedger::new());
        let client = client(&ledger, 1);
        let (org, subject) = (UserId::new(), UserId::new());
        assert!(!client.has_access(&org, &subject).await.unwrap());
        client
            .record(&LedgerFact::AccessGranted { grantor: org, subject })
            .await
            .unwrap();
        assert!(client.has_access(&org, &subject).await.unwrap());
        client
            .record(&LedgerFact::AccessRevoked { grantor: org, subject })
            .await
            .unwrap();
        assert!(!client.has_access(&org, &subject).await.unwrap());
    }
}
