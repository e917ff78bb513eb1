//! # Demo Subcommand
//!
//! Runs one subject through submission, review and access control. By
//! default every collaborator is in memory and the store and ledger can
//! be told to fail a number of times first, to watch the retry paths.
//! With `--remote` the pinning service and ledger gateway configured in
//! the environment are used instead.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use kyc_audit::AuditTrail;
use kyc_core::UserId;
use kyc_crypto::{Envelope, EnvelopeKey};
use kyc_engine::{DocumentUpload, EngineConfig, KycEngine, Role, StaticDirectory};
use kyc_ledger::{InMemoryLedger, Ledger, LedgerGateway, LedgerGatewayConfig};
use kyc_state::{IdentityRecord, KycStatus};
use kyc_store::{ContentStore, MemoryStore, PinningConfig, PinningStore};

/// Arguments for the demo subcommand.
#[derive(Args, Debug, Default)]
pub struct DemoArgs {
    /// Persist the audit trail to this journal.
    #[arg(long)]
    pub journal: Option<PathBuf>,
    /// Use the pinning service and ledger gateway from the environment.
    #[arg(long)]
    pub remote: bool,
    /// Make the in-memory store fail this many uploads first.
    #[arg(long, default_value_t = 0)]
    pub fail_store_puts: usize,
    /// Make the in-memory ledger fail this many submissions first.
    #[arg(long, default_value_t = 0)]
    pub fail_ledger_submissions: usize,
}

/// What the demo ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoSummary {
    pub subject: UserId,
    pub final_status: KycStatus,
    pub audit_entries: usize,
}

pub async fn run(args: &DemoArgs, out: &mut impl Write) -> anyhow::Result<DemoSummary> {
    let trail = Arc::new(match &args.journal {
        Some(path) => AuditTrail::open_journal(path)
            .with_context(|| format!("opening journal {}", path.display()))?,
        None => AuditTrail::new(),
    });
    let (envelope, store, ledger) = if args.remote {
        remote_collaborators()?
    } else {
        local_collaborators(args)
    };
    let directory = Arc::new(StaticDirectory::new());
    let engine = KycEngine::new(
        EngineConfig::from_env(),
        envelope,
        store,
        ledger,
        directory.clone(),
        trail.clone(),
    );

    let subject = directory.enroll(Role::Subject);
    let organization = directory.enroll(Role::Organization);
    let bystander = directory.enroll(Role::Organization);
    let operator = directory.enroll(Role::Operator);
    writeln!(out, "subject {subject}, organization {organization}, operator {operator}")?;

    let doc = engine
        .upload_document(
            subject,
            DocumentUpload::new(b"passport scan".to_vec(), "passport.png", "image/png"),
        )
        .await?;
    writeln!(out, "uploaded {} as {}", doc.name, doc.cid)?;

    let receipt = engine
        .submit_identity(
            subject,
            IdentityRecord {
                full_name: "Ada Example".into(),
                id_number: "P1234567".into(),
                date_of_birth: "1990-04-12".into(),
                address: "1 Demo Street".into(),
            },
        )
        .await?;
    writeln!(
        out,
        "submitted manifest {} in tx {} at height {} -> {}",
        receipt.manifest, receipt.tx_ref, receipt.block_height, receipt.status
    )?;

    let frame = engine.record_liveness_step(subject, 1, b"frame-1".to_vec()).await?;
    writeln!(out, "liveness step 1 stored as {frame}")?;

    let grant = engine.grant(organization, subject).await?;
    writeln!(out, "granted {} to {organization}", grant.grant.id)?;
    writeln!(out, "check(organization) = {}", engine.check(organization, subject).await?)?;

    let status = engine.complete_checklist(operator, subject, true, true).await?;
    writeln!(out, "review complete -> {status}")?;
    writeln!(out, "check(organization) = {}", engine.check(organization, subject).await?)?;
    writeln!(out, "check(bystander) = {}", engine.check(bystander, subject).await?)?;

    let view = engine.get_identity(organization, subject).await?;
    writeln!(
        out,
        "organization read identity of {} ({} documents)",
        view.identity.full_name,
        view.documents.len()
    )?;

    engine.revoke(organization, subject).await?;
    writeln!(out, "revoked; check(organization) = {}", engine.check(organization, subject).await?)?;

    let stats = engine.stats(operator).await?;
    writeln!(out, "stats: {}", serde_json::to_string(&stats)?)?;
    let verified = trail.verify_chain(&subject)?;
    writeln!(out, "audit chain verified: {verified} entries")?;

    Ok(DemoSummary {
        subject,
        final_status: engine.status(subject).await?,
        audit_entries: verified,
    })
}

type Collaborators = (Envelope, Arc<dyn ContentStore>, Arc<dyn Ledger>);

fn local_collaborators(args: &DemoArgs) -> Collaborators {
    let store = Arc::new(MemoryStore::new());
    store.fail_next_puts(args.fail_store_puts);
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.fail_next_submissions(args.fail_ledger_submissions);
    let envelope = match Envelope::from_env() {
        Ok(envelope) => envelope,
        Err(_) => {
            tracing::info!("no envelope key configured, using a throwaway key");
            Envelope::new(&EnvelopeKey::generate())
        }
    };
    let store: Arc<dyn ContentStore> = store;
    let ledger: Arc<dyn Ledger> = ledger;
    (envelope, store, ledger)
}

fn remote_collaborators() -> anyhow::Result<Collaborators> {
    let envelope = Envelope::from_env()?;
    let store = PinningStore::new(PinningConfig::from_env()?)?;
    let ledger = LedgerGateway::new(LedgerGatewayConfig::from_env()?)?;
    Ok((envelope, Arc::new(store), Arc::new(ledger)))
}
