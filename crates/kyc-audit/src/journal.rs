//! # JSON-Lines Journal
//!
//! Optional durable backing for an [`AuditTrail`](crate::AuditTrail). One
//! entry per line, appended and synced before the entry becomes visible
//! in memory. A journal can be replayed into a fresh trail on startup or
//! inspected offline by the `kyc audit` commands.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::entry::AuditEntry;
use crate::error::AuditError;

/// Append-only journal file.
///
/// A line only counts once its trailing newline is synced. A write that
/// fails is rolled back to the last committed length, and an
/// unterminated final line left by a crash is dropped when the journal
/// is opened or read.
#[derive(Debug)]
pub struct AuditJournal {
    path: PathBuf,
    file: Mutex<JournalFile>,
}

#[derive(Debug)]
struct JournalFile {
    file: File,
    /// Length of the newline-terminated prefix written so far.
    committed: u64,
}

impl AuditJournal {
    /// Open `path` for appending, creating it if absent. A torn final
    /// line is truncated away.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let raw = std::fs::read(&path)?;
        let committed = complete_prefix(&raw) as u64;
        if committed < raw.len() as u64 {
            tracing::warn!(
                path = %path.display(),
                discarded_bytes = raw.len() as u64 - committed,
                "truncating unterminated audit journal tail"
            );
            file.set_len(committed)?;
            file.sync_data()?;
        }
        Ok(Self {
            path,
            file: Mutex::new(JournalFile { file, committed }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and sync it to disk. On failure the file is cut
    /// back to its previous length.
    pub fn write(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(entry).map_err(std::io::Error::from)?;
        line.push(b'\n');
        let mut guard = self.file.lock();
        let JournalFile { file, committed } = &mut *guard;

        let on_disk = file.metadata()?.len();
        if on_disk > *committed {
            tracing::warn!(
                path = %self.path.display(),
                discarded_bytes = on_disk - *committed,
                "audit journal grew past its last committed line, truncating"
            );
            file.set_len(*committed)?;
        }

        if let Err(err) = file.write_all(&line).and_then(|()| file.sync_data()) {
            if let Err(rollback) = file.set_len(*committed) {
                tracing::error!(
                    path = %self.path.display(),
                    "failed to roll back partial journal write: {rollback}"
                );
            }
            return Err(err.into());
        }
        *committed += line.len() as u64;
        Ok(())
    }

    /// Read every entry in `path`, in file order. Blank lines and an
    /// unterminated final line are skipped.
    pub fn read(path: impl AsRef<Path>) -> Result<Vec<AuditEntry>, AuditError> {
        let raw = std::fs::read(path)?;
        let complete = &raw[..complete_prefix(&raw)];
        let mut entries = Vec::new();
        for (idx, line) in complete.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let entry = serde_json::from_slice(line).map_err(|source| AuditError::MalformedJournal {
                line: idx + 1,
                source,
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// Length of the newline-terminated prefix of `raw`.
fn complete_prefix(raw: &[u8]) -> usize {
    raw.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1)
}
