//! # Key and Envelope Subcommands
//!
//! `key generate` prints a fresh hex key for `KYC_ENCRYPTION_KEY`.
//! `seal` and `open` apply the same envelope the engine uses, so an
//! operator can open a sealed blob fetched from the content store when
//! given the subject it was bound to.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use kyc_core::UserId;
use kyc_crypto::{Envelope, EnvelopeKey, SealedRecord, KEY_ENV_VAR};

/// Arguments for the key subcommand.
#[derive(Args, Debug)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub command: KeyCommand,
}

#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Generate a random 256-bit key and print it as hex.
    Generate,
}

/// Arguments for `seal`.
#[derive(Args, Debug)]
pub struct SealArgs {
    /// Plaintext file.
    #[arg(long)]
    pub input: PathBuf,
    /// Where to write the sealed record (JSON). Defaults to stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Bind the record to this subject.
    #[arg(long)]
    pub subject: Option<UserId>,
}

/// Arguments for `open`.
#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Sealed record (JSON).
    #[arg(long)]
    pub input: PathBuf,
    /// Where to write the plaintext. Defaults to stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Subject the record was bound to.
    #[arg(long)]
    pub subject: Option<UserId>,
}

pub fn run_key(args: &KeyArgs, out: &mut impl Write) -> anyhow::Result<()> {
    match args.command {
        KeyCommand::Generate => {
            let key = EnvelopeKey::generate();
            writeln!(out, "{}", key.to_hex())?;
            tracing::info!("generated envelope key; export it as {KEY_ENV_VAR}");
        }
    }
    Ok(())
}

pub fn run_seal(args: &SealArgs, envelope: &Envelope, out: &mut impl Write) -> anyhow::Result<()> {
    let plaintext = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let sealed = envelope.seal(&plaintext, &aad(args.subject.as_ref()))?;
    let json = serde_json::to_vec_pretty(&sealed)?;
    emit(args.output.as_ref(), &json, out)?;
    tracing::info!(bytes = plaintext.len(), "sealed {}", args.input.display());
    Ok(())
}

pub fn run_open(args: &OpenArgs, envelope: &Envelope, out: &mut impl Write) -> anyhow::Result<()> {
    let raw = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let sealed: SealedRecord = serde_json::from_slice(&raw)
        .with_context(|| format!("{} is not a sealed record", args.input.display()))?;
    let plaintext = envelope
        .open(&sealed, &aad(args.subject.as_ref()))
        .context("record did not open; check the key and --subject")?;
    emit(args.output.as_ref(), &plaintext, out)
}

fn aad(subject: Option<&UserId>) -> Vec<u8> {
    subject.map(|s| s.to_string().into_bytes()).unwrap_or_default()
}

fn emit(path: Option<&PathBuf>, bytes: &[u8], out: &mut impl Write) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
        }
        None => out.write_all(bytes)?,
    }
    Ok(())
}
