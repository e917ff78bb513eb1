//! Shared harness: an engine over the in-memory store, ledger and
//! directory, with handles kept for failure injection.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use kyc_audit::AuditTrail;
use kyc_core::UserId;
use kyc_crypto::{Envelope, EnvelopeKey};
use kyc_engine::{EngineConfig, KycEngine, Role, StaticDirectory};
use kyc_ledger::InMemoryLedger;
use kyc_state::IdentityRecord;
use kyc_store::MemoryStore;

pub struct Harness {
    pub engine: KycEngine,
    pub envelope: Envelope,
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<InMemoryLedger>,
    pub directory: Arc<StaticDirectory>,
    pub trail: Arc<AuditTrail>,
    pub operator: UserId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::fast())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_trail(config, Arc::new(AuditTrail::new()))
    }

    pub fn with_trail(config: EngineConfig, trail: Arc<AuditTrail>) -> Self {
        let envelope = Envelope::new(&EnvelopeKey::generate());
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let directory = Arc::new(StaticDirectory::new());
        let operator = directory.enroll(Role::Operator);
        let engine = KycEngine::new(
            config,
            envelope.clone(),
            store.clone(),
            ledger.clone(),
            directory.clone(),
            trail.clone(),
        );
        Self {
            engine,
            envelope,
            store,
            ledger,
            directory,
            trail,
            operator,
        }
    }

    /// A second engine over the same collaborators and trail, with its own
    /// projection cache.
    pub fn sibling(&self, config: EngineConfig) -> KycEngine {
        KycEngine::new(
            config,
            self.envelope.clone(),
            self.store.clone(),
            self.ledger.clone(),
            self.directory.clone(),
            self.trail.clone(),
        )
    }

    pub fn subject(&self) -> UserId {
        self.directory.enroll(Role::Subject)
    }

    pub fn organization(&self) -> UserId {
        self.directory.enroll(Role::Organization)
    }
}

pub fn identity(name: &str) -> IdentityRecord {
    IdentityRecord {
        full_name: name.to_string(),
        id_number: format!("ID-{}", name.len()),
        date_of_birth: "1990-04-12".to_string(),
        address: "12 Harbour Road".to_string(),
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
