//! # kyc CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::Parser;
use kyc_crypto::Envelope;
use tracing_subscriber::EnvFilter;

/// KYC operator toolchain.
///
/// Manages envelope keys, inspects audit journals and runs the
/// verification lifecycle against in-memory or configured backends.
#[derive(Parser, Debug)]
#[command(name = "kyc", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Envelope key management.
    Key(kyc_cli::envelope::KeyArgs),
    /// Seal a file under the configured envelope key.
    Seal(kyc_cli::envelope::SealArgs),
    /// Open a sealed record.
    Open(kyc_cli::envelope::OpenArgs),
    /// Verify, replay and list an audit journal.
    Audit(kyc_cli::audit::AuditArgs),
    /// Show the effective configuration.
    Config(kyc_cli::config::ConfigArgs),
    /// Run the verification lifecycle end to end.
    Demo(kyc_cli::demo::DemoArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Key(args) => kyc_cli::envelope::run_key(&args, &mut out)?,
        Commands::Seal(args) => kyc_cli::envelope::run_seal(&args, &Envelope::from_env()?, &mut out)?,
        Commands::Open(args) => kyc_cli::envelope::run_open(&args, &Envelope::from_env()?, &mut out)?,
        Commands::Audit(args) => kyc_cli::audit::run(&args, &mut out)?,
        Commands::Config(args) => kyc_cli::config::run(&args, &mut out)?,
        Commands::Demo(args) => {
            let summary = kyc_cli::demo::run(&args, &mut out).await?;
            tracing::info!(subject = %summary.subject, status = %summary.final_status, "demo finished");
        }
    }

    Ok(())
}
