//! # kyc-audit — Audit Trail Recorder
//!
//! The audit trail is the system of record. Subject status, identity
//! pointers and access grants held anywhere else are projections that
//! can be rebuilt by folding a subject's entries in sequence order
//! ([`AuditTrail::reconstruct`]).
//!
//! ## Ordering
//!
//! Each subject has its own log with a sequence number starting at 1 and
//! increasing by one per entry. Appends for different subjects lock
//! different logs and never contend. Appends for the same subject are
//! additionally serialized by the engine's per-subject lock, so the
//! sequence order matches the order in which transitions were committed.
//!
//! ## Tamper Evidence
//!
//! Every entry stores the digest of its predecessor in the same subject
//! log and its own digest over the canonical bytes of all other fields.
//! [`AuditTrail::verify_chain`] recomputes the chain.
//!
//! ## Durability Flags
//!
//! - `confirmed`: the external effect (store write and/or ledger fact)
//!   was acknowledged before the entry was written.
//! - `local_only`: the action has no external effect to confirm.
//! - `failed`: the operation was attempted and aborted. Kept for
//!   operators; ignored by the fold.

pub mod entry;
pub mod error;
pub mod event;
pub mod fold;
pub mod journal;
pub mod trail;

pub use entry::{AuditEntry, AuditRecord};
pub use error::AuditError;
pub use event::{AuditAction, AuditEvent, Durability};
pub use fold::{apply_entry, fold_entries, SubjectProjection};
pub use journal::AuditJournal;
pub use trail::{verify_entries, AuditFilter, AuditPage, AuditTrail, Pagination, SortOrder};
