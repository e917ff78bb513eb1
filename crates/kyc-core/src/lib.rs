//! # kyc-core — Foundational Types for the KYC Vault
//!
//! Every other crate in the workspace depends on `kyc-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `UserId`, `GrantId`, `Cid`,
//!    `TxRef`. No bare strings cross a component boundary. A content
//!    identifier cannot be passed where a ledger transaction reference is
//!    expected.
//!
//! 2. **`CanonicalBytes` for every digest.** Manifest digests and the audit
//!    hash chain are computed over RFC 8785 canonical JSON only.
//!
//! 3. **UTC-only timestamps.** `Timestamp` is UTC with `Z` suffix and
//!    seconds precision.
//!
//! 4. **One retry policy shape.** Both external collaborators (content store
//!    and ledger) back off with the same bounded exponential `RetryPolicy`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `kyc-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod retry;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_bytes, sha256_digest, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, CoreError};
pub use identity::{Cid, GrantId, TxRef, UserId};
pub use retry::RetryPolicy;
pub use temporal::Timestamp;
