//! # kyc-store — Content Store Client
//!
//! Uploads and retrieves opaque (already sealed) blobs by content
//! identifier. The vault never talks to an object store except through
//! the [`ContentStore`] trait, and never without the retrying
//! [`StoreClient`] wrapper in front of it.
//!
//! ## Error Contract
//!
//! - `put` fails with [`StoreError::Unavailable`] or
//!   [`StoreError::QuotaExceeded`]; both are retried with exponential
//!   backoff before being surfaced. No CID is handed back unless the
//!   store acknowledged the upload.
//! - `get` fails with [`StoreError::NotFound`] (never retried) or
//!   `Unavailable` (retried). Callers holding a CID that a subject
//!   references must treat `NotFound` as an integrity violation.
//!
//! ## Implementations
//!
//! - [`PinningStore`]: HTTP pinning service plus read gateway.
//! - [`MemoryStore`]: process-local, content-addressed by SHA-256, with
//!   failure injection for tests and the demo binary.

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod pinning;

use async_trait::async_trait;
use kyc_core::Cid;

pub use client::StoreClient;
pub use config::{ConfigError, PinningConfig};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use pinning::PinningStore;

/// A content-addressed blob store.
///
/// Implementations translate every transport or service response into a
/// [`StoreError`]; untyped responses never cross this boundary.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Upload `bytes` and return their content identifier.
    async fn put(&self, bytes: &[u8], name_hint: &str) -> Result<Cid, StoreError>;

    /// Fetch the blob stored under `cid`.
    async fn get(&self, cid: &Cid) -> Result<Vec<u8>, StoreError>;
}
