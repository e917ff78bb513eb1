//! Retrying wrapper around a [`ContentStore`].
//!
//! Retries only transient failures. `NotFound` and an exhausted retry
//! budget are returned to the caller unchanged.

use std::sync::Arc;

use kyc_core::{Cid, RetryPolicy};

use crate::error::StoreError;
use crate::ContentStore;

/// Content store handle with bounded exponential backoff.
#[derive(Clone)]
pub struct StoreClient {
    inner: Arc<dyn ContentStore>,
    retry: RetryPolicy,
}

impl StoreClient {
    /// Wrap a store with a retry policy.
    pub fn new(inner: Arc<dyn ContentStore>, retry: RetryPolicy) -> Self {
        Self { inner, retry }
    }

    /// The retry policy in effect.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Upload with retry on `Unavailable` and `QuotaExceeded`.
    pub async fn put(&self, bytes: &[u8], name_hint: &str) -> Result<Cid, StoreError> {
        let mut attempt = 1;
        loop {
            match self.inner.put(bytes, name_hint).await {
                Ok(cid) => {
                    tracing::debug!(%cid, attempt, name_hint, "content store put acknowledged");
                    return Ok(cid);
                }
                Err(e) if e.is_retryable_put() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        name_hint,
                        "content store put failed, retrying in {delay:?}: {e}"
                    );
                    metrics::counter!(
                        "kyc_external_retries_total",
                        "dependency" => "content_store",
                        "operation" => "put"
                    )
                    .increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch with retry on `Unavailable`. `NotFound` is returned at once.
    pub async fn get(&self, cid: &Cid) -> Result<Vec<u8>, StoreError> {
        let mut attempt = 1;
        loop {
            match self.inner.get(cid).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_retryable_get() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(%cid, attempt, "content store get failed, retrying in {delay:?}: {e}");
                    metrics::counter!(
                        "kyc_external_retries_total",
                        "dependency" => "content_store",
                        "operation" => "get"
                    )
                    .increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn client(store: &Arc<MemoryStore>, attempts: u32) -> StoreClient {
        StoreClient::new(store.clone(), RetryPolicy::immediate(attempts))
    }

    #[tokio::test]
    async fn put_succeeds_after_transient_failures() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_puts(2);
        let cid = client(&store, 3).put(b"sealed", "manifest").await.unwrap();
        assert_eq!(store.put_attempts(), 3);
        assert!(store.contains(&cid));
    }

    #[tokio::test]
    async fn put_surfaces_error_after_budget() {
        let store = Arc::new(MemoryStore::new());
        store.inject_put_failure(StoreError::QuotaExceeded("rate".into()));
        store.inject_put_failure(StoreError::QuotaExceeded("rate".into()));
        let err = client(&store, 2).put(b"sealed", "manifest").await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded(_)));
        assert_eq!(store.put_attempts(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn get_not_found_is_not_retried() {
        let store = Arc::new(MemoryStore::new());
        let cid = Cid::parse("sha256:missing").unwrap();
        let err = client(&store, 5).get(&cid).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound(cid));
        assert_eq!(store.get_attempts(), 1);
    }

    #[tokio::test]
    async fn get_retries_unavailable() {
        let store = Arc::new(MemoryStore::new());
        let cid = client(&store, 1).put(b"blob", "x").await.unwrap();
        store.fail_next_gets(1);
        assert_eq!(client(&store, 2).get(&cid).await.unwrap(), b"blob");
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_waits_between_attempts() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_puts(2);
        let policy = RetryPolicy::new(
            3,
            std::time::Duration::from_millis(200),
            std::time::Duration::from_secs(1),
        );
        let started = tokio::time::Instant::now();
        StoreClient::new(store.clone(), policy)
            .put(b"sealed", "manifest")
            .await
            .unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_millis(600));
    }
}
