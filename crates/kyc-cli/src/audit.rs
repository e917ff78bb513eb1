//! # Audit Journal Subcommands
//!
//! All three operate on a JSON-lines journal read from disk. Loading a
//! journal re-verifies every digest link, so a journal that loads is a
//! journal whose chains are intact.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use kyc_audit::{AuditAction, AuditFilter, AuditJournal, AuditTrail, Pagination};
use kyc_core::{Timestamp, UserId};

/// Arguments for the audit subcommand.
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Journal file (JSON lines).
    #[arg(long, env = "KYC_AUDIT_JOURNAL")]
    pub journal: PathBuf,

    #[command(subcommand)]
    pub command: AuditCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Check every subject's digest chain.
    Verify,
    /// Fold the journal and print each subject's reconstructed state.
    Replay {
        /// Only this subject.
        #[arg(long)]
        subject: Option<UserId>,
    },
    /// Page through one subject's history, newest first.
    List {
        #[arg(long)]
        subject: UserId,
        /// Restrict to these actions (repeatable), e.g. `access_granted`.
        #[arg(long = "action")]
        actions: Vec<AuditAction>,
        /// Inclusive lower bound, RFC 3339.
        #[arg(long, value_parser = parse_timestamp)]
        from: Option<Timestamp>,
        /// Inclusive upper bound, RFC 3339.
        #[arg(long, value_parser = parse_timestamp)]
        to: Option<Timestamp>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = Pagination::DEFAULT_LIMIT)]
        limit: u32,
        #[arg(long)]
        oldest_first: bool,
        /// Hide entries of aborted operations.
        #[arg(long)]
        effective_only: bool,
    },
}

fn parse_timestamp(s: &str) -> Result<Timestamp, String> {
    Timestamp::parse_lenient(s).map_err(|e| e.to_string())
}

pub fn run(args: &AuditArgs, out: &mut impl Write) -> anyhow::Result<()> {
    let entries = AuditJournal::read(&args.journal)
        .with_context(|| format!("reading journal {}", args.journal.display()))?;
    let trail = AuditTrail::from_entries(entries)
        .with_context(|| format!("journal {} failed verification", args.journal.display()))?;

    match &args.command {
        AuditCommand::Verify => {
            let mut total = 0;
            for subject in trail.subjects() {
                let verified = trail.verify_chain(&subject)?;
                writeln!(out, "{subject}: {verified} entries verified")?;
                total += verified;
            }
            writeln!(out, "ok: {total} entries across {} subjects", trail.subjects().len())?;
        }
        AuditCommand::Replay { subject } => {
            let subjects = match subject {
                Some(s) => vec![*s],
                None => trail.subjects(),
            };
            let mut projections = Vec::with_capacity(subjects.len());
            for s in &subjects {
                projections.push(trail.reconstruct(s)?);
            }
            serde_json::to_writer_pretty(&mut *out, &projections)?;
            writeln!(out)?;
        }
        AuditCommand::List {
            subject,
            actions,
            from,
            to,
            page,
            limit,
            oldest_first,
            effective_only,
        } => {
            let mut filter = AuditFilter::default()
                .actions(actions.iter().copied())
                .between(*from, *to);
            if *oldest_first {
                filter = filter.oldest_first();
            }
            if *effective_only {
                filter = filter.effective_only();
            }
            let page = trail.list_for_subject(subject, &filter, Pagination::new(*page, *limit));
            serde_json::to_writer_pretty(&mut *out, &page)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyc_audit::{AuditEvent, AuditRecord};
    use kyc_core::{Cid, TxRef};

    fn journal_with_two_submissions(path: &std::path::Path, subject: UserId) {
        let trail = AuditTrail::open_journal(path).unwrap();
        for tag in ["aa", "bb"] {
            let record = AuditRecord::confirmed(
                subject,
                subject,
                Timestamp::now(),
                AuditEvent::IdentitySubmitted {
                    manifest: Cid::parse(format!("sha256:{tag}")).unwrap(),
                    supersedes: None,
                },
            )
            .with_ledger(TxRef::parse(format!("0x{tag}")).unwrap(), 1);
            trail.append(record).unwrap();
        }
    }

    #[test]
    fn verify_reports_each_subject() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let subject = UserId::new();
        journal_with_two_submissions(&path, subject);

        let mut out = Vec::new();
        let args = AuditArgs {
            journal: path,
            command: AuditCommand::Verify,
        };
        run(&args, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&format!("{subject}: 2 entries verified")));
        assert!(text.contains("ok: 2 entries across 1 subjects"));
    }

    #[test]
    fn replay_prints_the_latest_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let subject = UserId::new();
        journal_with_two_submissions(&path, subject);

        let mut out = Vec::new();
        let args = AuditArgs {
            journal: path,
            command: AuditCommand::Replay { subject: Some(subject) },
        };
        run(&args, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["subject"]["identity_pointer"], "sha256:bb");
        assert_eq!(value[0]["subject"]["status"], "pending");
        assert_eq!(value[0]["last_sequence"], 2);
    }

    #[test]
    fn list_pages_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let subject = UserId::new();
        journal_with_two_submissions(&path, subject);

        let mut out = Vec::new();
        let args = AuditArgs {
            journal: path,
            command: AuditCommand::List {
                subject,
                actions: vec![AuditAction::IdentitySubmitted],
                from: None,
                to: None,
                page: 1,
                limit: 1,
                oldest_first: false,
                effective_only: false,
            },
        };
        run(&args, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["total"], 2);
        assert_eq!(value["pages"], 2);
        assert_eq!(value["entries"][0]["sequence"], 2);
    }

    #[test]
    fn missing_journal_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = AuditArgs {
            journal: dir.path().join("absent.jsonl"),
            command: AuditCommand::Verify,
        };
        assert!(run(&args, &mut Vec::new()).is_err());
    }
}
