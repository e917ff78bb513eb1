//! # kyc-cli — Operator Command-Line Interface
//!
//! ## Subcommands
//!
//! - `key`: generate an envelope key
//! - `seal` / `open`: seal or open a file under `KYC_ENCRYPTION_KEY`
//! - `audit`: verify, replay and list an audit journal
//! - `config`: show the effective configuration with secrets redacted
//! - `demo`: run the verification lifecycle end to end in memory
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in the `*Args` types; handlers take parsed
//!   arguments and an output sink, so they are testable without a process.
//! - Handlers delegate to the domain crates. No lifecycle logic here.

pub mod audit;
pub mod config;
pub mod demo;
pub mod envelope;
