//! # kyc-state — Subject and Grant State
//!
//! Plain data plus the rules for changing it. Nothing in this crate
//! performs I/O: the engine runs external effects first and then applies
//! the transition here, and the audit fold replays the very same
//! transitions to rebuild state from the journal.
//!
//! ## Subject Lifecycle
//!
//! ```text
//!              submit                  complete(pass, pass)
//! NotStarted ─────────▶ Pending ────────────────────────────▶ Verified
//!                       ▲  │  ▲                                  │
//!        submit(update) └──┘  │ submit            submit          │
//!                             │                                  │
//!                       Rejected ◀── complete(any fail) ── Pending
//! ```
//!
//! Every `submit` lands in `Pending` with a cleared checklist, including a
//! re-submission from `Verified`.
//!
//! ## Grants
//!
//! [`GrantBook`] keeps the full grant history for one subject with at
//! most one active grant per grantor. Re-granting after revocation
//! appends a new record; revoked records are never revived.

pub mod grant;
pub mod manifest;
pub mod subject;

pub use grant::{AccessGrant, GrantBook, GrantError, GrantStatus};
pub use manifest::{DocumentRef, IdentityManifest, IdentityRecord, MANIFEST_VERSION};
pub use subject::{
    liveness_step_key, ChecklistEntry, KycStatus, Subject, SubjectAction, TransitionError,
    VerificationChecklist, DOCUMENT_CHECK, LIVENESS_CHECK,
};
