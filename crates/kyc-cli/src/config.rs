//! # Config Subcommand
//!
//! Prints the configuration each component would load from the
//! environment. Secrets are redacted by the config types' `Debug`.

use std::io::Write;

use clap::Args;
use kyc_crypto::EnvelopeKey;
use kyc_engine::EngineConfig;
use kyc_ledger::LedgerGatewayConfig;
use kyc_store::PinningConfig;

/// Arguments for the config subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {}

pub fn run(_args: &ConfigArgs, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "engine: {:#?}", EngineConfig::from_env())?;
    match EnvelopeKey::from_env() {
        Ok(_) => writeln!(out, "envelope key: configured")?,
        Err(e) => writeln!(out, "envelope key: {e}")?,
    }
    match PinningConfig::from_env() {
        Ok(cfg) => writeln!(out, "content store: {cfg:#?}")?,
        Err(e) => writeln!(out, "content store: not configured ({e})")?,
    }
    match LedgerGatewayConfig::from_env() {
        Ok(cfg) => writeln!(out, "ledger: {cfg:#?}")?,
        Err(e) => writeln!(out, "ledger: not configured ({e})")?,
    }
    Ok(())
}
