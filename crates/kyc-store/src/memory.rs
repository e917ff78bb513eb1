//! # In-Memory Content Store
//!
//! Content-addressed by SHA-256 of the blob (`sha256:<hex>`), so putting
//! the same bytes twice yields the same CID. Failure injection hooks let
//! tests and the demo simulate an unreliable store.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use kyc_core::{sha256_bytes, Cid};
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::ContentStore;

#[derive(Debug, Default)]
struct MemoryState {
    blobs: HashMap<Cid, Vec<u8>>,
    put_failures: VecDeque<StoreError>,
    get_failures: VecDeque<StoreError>,
    put_attempts: u64,
    get_attempts: u64,
}

/// Process-local content-addressed store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    max_blob_bytes: Option<usize>,
}

impl MemoryStore {
    /// Create an empty store with no size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store rejecting blobs above `max_blob_bytes`.
    pub fn with_max_blob_bytes(max_blob_bytes: usize) -> Self {
        Self {
            state: Mutex::default(),
            max_blob_bytes: Some(max_blob_bytes),
        }
    }

    /// Queue an error to be returned by the next `put`.
    pub fn inject_put_failure(&self, err: StoreError) {
        self.state.lock().put_failures.push_back(err);
    }

    /// Fail the next `n` puts with `Unavailable`.
    pub fn fail_next_puts(&self, n: usize) {
        let mut state = self.state.lock();
        for _ in 0..n {
            state
                .put_failures
                .push_back(StoreError::Unavailable("injected put failure".into()));
        }
    }

    /// Fail the next `n` gets with `Unavailable`.
    pub fn fail_next_gets(&self, n: usize) {
        let mut state = self.state.lock();
        for _ in 0..n {
            state
                .get_failures
                .push_back(StoreError::Unavailable("injected get failure".into()));
        }
    }

    /// Drop a blob, simulating loss in the external store.
    pub fn evict(&self, cid: &Cid) -> bool {
        self.state.lock().blobs.remove(cid).is_some()
    }

    /// Whether a blob is stored under `cid`.
    pub fn contains(&self, cid: &Cid) -> bool {
        self.state.lock().blobs.contains_key(cid)
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.state.lock().blobs.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total `put` calls, including failed ones.
    pub fn put_attempts(&self) -> u64 {
        self.state.lock().put_attempts
    }

    /// Total `get` calls, including failed ones.
    pub fn get_attempts(&self) -> u64 {
        self.state.lock().get_attempts
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn put(&self, bytes: &[u8], _name_hint: &str) -> Result<Cid, StoreError> {
        let mut state = self.state.lock();
        state.put_attempts += 1;
        if let Some(err) = state.put_failures.pop_front() {
            return Err(err);
        }
        if let Some(max) = self.max_blob_bytes {
            if bytes.len() > max {
                return Err(StoreError::QuotaExceeded(format!(
                    "blob of {} bytes exceeds limit of {max}",
                    bytes.len()
                )));
            }
        }
        let cid = Cid::parse(sha256_bytes(bytes).to_string())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        state.blobs.insert(cid.clone(), bytes.to_vec());
        Ok(cid)
    }

    async fn get(&self, cid: &Cid) -> Result<Vec<u8>, StoreError> {
        let mut state = self.state.lock();
        state.get_attempts += 1;
        if let Some(err) = state.get_failures.pop_front() {
            return Err(err);
        }
        state
            .blobs
            .get(cid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(cid.clone()))
    }
}
