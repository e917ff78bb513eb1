//! # kyc-ledger — Ledger Client
//!
//! Records immutable facts about subjects on an external transactional
//! ledger and answers read-only access queries against it.
//!
//! ## Submission Model
//!
//! Submission is asynchronous. [`Ledger::submit_fact`] hands back a
//! [`PendingTx`]; the fact is not durable until
//! [`Ledger::await_confirmation`] resolves to [`Confirmation::Confirmed`].
//! The [`LedgerClient`] wrapper owns the policy around that:
//!
//! - every confirmation wait is bounded by a timeout; a timeout counts as
//!   a failed attempt, never a hang;
//! - a `Failed` confirmation, a timeout or a transport error triggers a
//!   *new* submission under a fresh nonce. A pending transaction is never
//!   resubmitted;
//! - after the attempt budget is spent the caller gets
//!   [`LedgerError::Exhausted`] and must not mutate local state.
//!
//! ## Staleness
//!
//! [`Ledger::has_access`] may lag behind confirmed facts. Callers that need
//! a causally up-to-date answer replay their own audit trail instead.
//!
//! ## Implementations
//!
//! - [`LedgerGateway`]: REST gateway in front of a real ledger node.
//! - [`InMemoryLedger`]: simulated chain with block heights and failure
//!   injection, used by tests and the demo binary.

pub mod client;
pub mod config;
pub mod error;
pub mod fact;
pub mod gateway;
pub mod memory;

use async_trait::async_trait;
use kyc_core::UserId;

pub use client::{LedgerClient, LedgerReceipt};
pub use config::{ConfigError, LedgerGatewayConfig};
pub use error::LedgerError;
pub use fact::{Confirmation, FactKind, LedgerFact, PendingTx};
pub use gateway::LedgerGateway;
pub use memory::{InMemoryLedger, SubmittedFact};

/// An external ledger capable of recording facts.
///
/// Implementations must translate every service response into the typed
/// [`Confirmation`] / [`LedgerError`] vocabulary.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submit a fact under the given nonce. Each nonce is used once.
    async fn submit_fact(&self, fact: &LedgerFact, nonce: u64) -> Result<PendingTx, LedgerError>;

    /// Wait until the pending transaction resolves.
    async fn await_confirmation(&self, pending: &PendingTx) -> Result<Confirmation, LedgerError>;

    /// Whether the ledger currently records an active grant from
    /// `grantor` on `subject`. May be stale.
    async fn has_access(&self, grantor: &UserId, subject: &UserId) -> Result<bool, LedgerError>;
}
