//! # Audit Trail
//!
//! Per-subject logs behind a shared map, plus a timestamp index across
//! all subjects for operator-wide range queries.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use kyc_core::{Timestamp, UserId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::entry::{AuditEntry, AuditRecord};
use crate::error::AuditError;
use crate::event::AuditAction;
use crate::fold::{fold_entries, SubjectProjection};
use crate::journal::AuditJournal;

type SubjectLog = Arc<Mutex<Vec<AuditEntry>>>;

// ─── Query Types ─────────────────────────────────────────────────────

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Which entries to list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Actions to include. Empty means all.
    pub actions: Vec<AuditAction>,
    /// Inclusive lower bound on the entry timestamp.
    pub from: Option<Timestamp>,
    /// Inclusive upper bound on the entry timestamp.
    pub to: Option<Timestamp>,
    pub include_failed: bool,
    pub order: SortOrder,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            from: None,
            to: None,
            include_failed: true,
            order: SortOrder::NewestFirst,
        }
    }
}

impl AuditFilter {
    pub fn actions(mut self, actions: impl IntoIterator<Item = AuditAction>) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }

    pub fn between(mut self, from: Option<Timestamp>, to: Option<Timestamp>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn effective_only(mut self) -> Self {
        self.include_failed = false;
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.order = SortOrder::OldestFirst;
        self
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        (self.actions.is_empty() || self.actions.contains(&entry.action()))
            && self.from.map_or(true, |from| entry.timestamp >= from)
            && self.to.map_or(true, |to| entry.timestamp <= to)
            && (self.include_failed || entry.is_effective())
    }
}

/// Page request. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp `page` to at least 1 and `limit` to `1..=MAX_LIMIT`.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_LIMIT)
    }
}

/// One page of a subject's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    /// Matching entries across all pages.
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

// ─── Trail ───────────────────────────────────────────────────────────

/// Append-only audit trail.
#[derive(Default)]
pub struct AuditTrail {
    logs: RwLock<HashMap<UserId, SubjectLog>>,
    by_time: RwLock<BTreeSet<(Timestamp, UserId, u64)>>,
    journal: Option<AuditJournal>,
}

impl AuditTrail {
    /// An in-memory trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty trail that writes every entry to `journal` first.
    pub fn with_journal(journal: AuditJournal) -> Self {
        Self {
            journal: Some(journal),
            ..Self::default()
        }
    }

    /// Replay the journal at `path` (if it exists) and keep appending to it.
    pub fn open_journal(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        let journal = AuditJournal::open(path)?;
        let existing = AuditJournal::read(path)?;
        let trail = Self::with_journal(journal);
        for entry in existing {
            trail.restore(entry)?;
        }
        tracing::info!(path = %path.display(), entries = trail.len(), "audit journal replayed");
        Ok(trail)
    }

    /// Rebuild an in-memory trail from previously written entries,
    /// verifying sequence and digest links as it goes.
    pub fn from_entries(entries: impl IntoIterator<Item = AuditEntry>) -> Result<Self, AuditError> {
        let trail = Self::new();
        for entry in entries {
            trail.restore(entry)?;
        }
        Ok(trail)
    }

    fn log_for(&self, subject: UserId) -> SubjectLog {
        if let Some(log) = self.logs.read().get(&subject) {
            return log.clone();
        }
        self.logs.write().entry(subject).or_default().clone()
    }

    fn existing_log(&self, subject: &UserId) -> Option<SubjectLog> {
        self.logs.read().get(subject).cloned()
    }

    /// Append a record, assigning the next sequence number for its subject.
    pub fn append(&self, record: AuditRecord) -> Result<AuditEntry, AuditError> {
        let log = self.log_for(record.subject);
        let mut entries = log.lock();
        let sequence = entries.len() as u64 + 1;
        let prev = entries.last().map(|e| e.digest.clone());
        let entry = AuditEntry::seal(record, sequence, prev)?;
        if let Some(journal) = &self.journal {
            journal.write(&entry)?;
        }
        entries.push(entry.clone());
        self.by_time
            .write()
            .insert((entry.timestamp, entry.subject, entry.sequence));
        drop(entries);

        tracing::debug!(
            subject = %entry.subject,
            sequence = entry.sequence,
            action = %entry.action(),
            durability = entry.durability.as_str(),
            "audit entry appended"
        );
        metrics::counter!(
            "kyc_audit_entries_total",
            "action" => entry.action().as_str(),
            "durability" => entry.durability.as_str()
        )
        .increment(1);
        Ok(entry)
    }

    /// Insert an already sealed entry after checking it extends its
    /// subject's chain. Not written to the journal.
    fn restore(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let log = self.log_for(entry.subject);
        let mut entries = log.lock();
        check_link(entries.last(), &entry)?;
        self.by_time
            .write()
            .insert((entry.timestamp, entry.subject, entry.sequence));
        entries.push(entry);
        Ok(())
    }

    /// All entries for `subject`, oldest first.
    pub fn entries(&self, subject: &UserId) -> Vec<AuditEntry> {
        self.existing_log(subject)
            .map(|log| log.lock().clone())
            .unwrap_or_default()
    }

    /// Filtered, paginated history for one subject.
    pub fn list_for_subject(
        &self,
        subject: &UserId,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> AuditPage {
        let pagination = Pagination::new(pagination.page, pagination.limit);
        let mut matching: Vec<AuditEntry> = self
            .existing_log(subject)
            .map(|log| log.lock().iter().filter(|e| filter.matches(e)).cloned().collect())
            .unwrap_or_default();
        if filter.order == SortOrder::NewestFirst {
            matching.reverse();
        }
        let total = matching.len();
        let limit = pagination.limit as usize;
        let pages = total.div_ceil(limit) as u32;
        let skip = (pagination.page as usize - 1).saturating_mul(limit);
        let entries = matching.into_iter().skip(skip).take(limit).collect();
        AuditPage {
            entries,
            total,
            page: pagination.page,
            limit: pagination.limit,
            pages,
        }
    }

    /// Entries across all subjects with `from <= timestamp <= to`,
    /// oldest first.
    pub fn list_between(&self, from: Timestamp, to: Timestamp) -> Vec<AuditEntry> {
        if from > to {
            return Vec::new();
        }
        let keys: Vec<(Timestamp, UserId, u64)> = self
            .by_time
            .read()
            .iter()
            .filter(|(ts, _, _)| *ts >= from && *ts <= to)
            .copied()
            .collect();
        keys.into_iter()
            .filter_map(|(_, subject, sequence)| {
                let log = self.existing_log(&subject)?;
                let entries = log.lock();
                let index = usize::try_from(sequence).ok()?.checked_sub(1)?;
                entries.get(index).cloned()
            })
            .collect()
    }

    /// Deterministically rebuild a subject's state from its log.
    pub fn reconstruct(&self, subject: &UserId) -> Result<SubjectProjection, AuditError> {
        match self.existing_log(subject) {
            Some(log) => fold_entries(*subject, log.lock().iter()),
            None => Ok(SubjectProjection::empty(*subject)),
        }
    }

    /// Recompute the digest chain for `subject`. Returns the number of
    /// entries verified.
    pub fn verify_chain(&self, subject: &UserId) -> Result<usize, AuditError> {
        let entries = self.entries(subject);
        verify_entries(&entries)?;
        Ok(entries.len())
    }

    /// Subjects with at least one entry.
    pub fn subjects(&self) -> Vec<UserId> {
        let mut subjects: Vec<UserId> = self.logs.read().keys().copied().collect();
        subjects.sort();
        subjects
    }

    /// Sequence number of the newest entry for `subject`, 0 if none.
    pub fn last_sequence(&self, subject: &UserId) -> u64 {
        self.existing_log(subject)
            .map(|log| log.lock().len() as u64)
            .unwrap_or(0)
    }

    /// Total entries across all subjects.
    pub fn len(&self) -> usize {
        self.by_time.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether appends write through to a journal file.
    pub fn is_journaled(&self) -> bool {
        self.journal.is_some()
    }

    pub fn journal_path(&self) -> Option<&Path> {
        self.journal.as_ref().map(AuditJournal::path)
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("subjects", &self.logs.read().len())
            .field("entries", &self.len())
            .field("journal", &self.journal_path())
            .finish()
    }
}

fn check_link(prev: Option<&AuditEntry>, entry: &AuditEntry) -> Result<(), AuditError> {
    let broken = |reason: String| AuditError::ChainBroken {
        subject: entry.subject,
        sequence: entry.sequence,
        reason,
    };
    let expected_seq = prev.map_or(1, |p| p.sequence + 1);
    if entry.sequence != expected_seq {
        return Err(broken(format!("expected sequence {expected_seq}")));
    }
    let expected_prev = prev.map(|p| &p.digest);
    if entry.prev_digest.as_ref() != expected_prev {
        return Err(broken("previous digest does not match".into()));
    }
    if entry.compute_digest()? != entry.digest {
        return Err(broken("entry digest does not match its contents".into()));
    }
    Ok(())
}

/// Verify one subject's entries, in sequence order.
pub fn verify_entries(entries: &[AuditEntry]) -> Result<(), AuditError> {
    let mut prev: Option<&AuditEntry> = None;
    for entry in entries {
        if let Some(p) = prev {
            if p.subject != entry.subject {
                return Err(AuditError::ChainBroken {
                    subject: entry.subject,
                    sequence: entry.sequence,
                    reason: format!("entry belongs to {}, not {}", entry.subject, p.subject),
                });
            }
        }
        check_link(prev, entry)?;
        prev = Some(entry);
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AuditEvent, Durability};
    use kyc_core::{Cid, GrantId, TxRef};

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_epoch_secs(1_767_225_600 + secs).unwrap()
    }

    fn submitted(subject: UserId, at: Timestamp, tag: &str) -> AuditRecord {
        AuditRecord::confirmed(
            subject,
            subject,
            at,
            AuditEvent::IdentitySubmitted {
                manifest: Cid::parse(format!("sha256:{tag}")).unwrap(),
                supersedes: None,
            },
        )
        .with_ledger(TxRef::parse(format!("0x{tag}")).unwrap(), 1)
    }

    fn failed(subject: UserId, at: Timestamp) -> AuditRecord {
        AuditRecord {
            durability: Durability::Failed,
            ..AuditRecord::local(
                subject,
                subject,
                at,
                AuditEvent::OperationFailed {
                    attempted: AuditAction::IdentitySubmitted,
                    stage: "ledger".into(),
                    error: "exhausted".into(),
                },
            )
        }
    }

    #[test]
    fn sequences_start_at_one_per_subject() {
        let trail = AuditTrail::new();
        let (a, b) = (UserId::new(), UserId::new());
        assert_eq!(trail.append(submitted(a, ts(0), "a1")).unwrap().sequence, 1);
        assert_eq!(trail.append(submitted(b, ts(1), "b1")).unwrap().sequence, 1);
        let second = trail.append(submitted(a, ts(2), "a2")).unwrap();
        assert_eq!(second.sequence, 2);
        assert_eq!(second.prev_digest, Some(trail.entries(&a)[0].digest.clone()));
        assert_eq!(trail.len(), 3);
        assert_eq!(trail.last_sequence(&a), 2);
        assert_eq!(trail.last_sequence(&UserId::new()), 0);
    }

    #[test]
    fn listing_is_newest_first_and_paginated() {
        let trail = AuditTrail::new();
        let s = UserId::new();
        for i in 0..5 {
            trail.append(submitted(s, ts(i), &format!("{i}"))).unwrap();
        }
        let page = trail.list_for_subject(&s, &AuditFilter::default(), Pagination::new(1, 2));
        assert_eq!(page.total, 5);
        assert_eq!(page.pages, 3);
        let seqs: Vec<u64> = page.entries.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![5, 4]);

        let last = trail.list_for_subject(&s, &AuditFilter::default(), Pagination::new(3, 2));
        assert_eq!(last.entries.len(), 1);
        assert_eq!(last.entries[0].sequence, 1);

        let beyond = trail.list_for_subject(&s, &AuditFilter::default(), Pagination::new(9, 2));
        assert!(beyond.entries.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[test]
    fn filters_by_action_time_and_durability() {
        let trail = AuditTrail::new();
        let s = UserId::new();
        trail.append(submitted(s, ts(0), "x")).unwrap();
        trail.append(failed(s, ts(10))).unwrap();
        trail.append(submitted(s, ts(20), "y")).unwrap();

        let only_failed = AuditFilter::default().actions([AuditAction::OperationFailed]);
        assert_eq!(trail.list_for_subject(&s, &only_failed, Pagination::default()).total, 1);

        let effective = AuditFilter::default().effective_only();
        assert_eq!(trail.list_for_subject(&s, &effective, Pagination::default()).total, 2);

        let window = AuditFilter::default().between(Some(ts(5)), Some(ts(20))).oldest_first();
        let page = trail.list_for_subject(&s, &window, Pagination::default());
        let seqs: Vec<u64> = page.entries.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![2, 3]);
    }

    #[test]
    fn empty_history_has_zero_pages() {
        let trail = AuditTrail::new();
        let page = trail.list_for_subject(&UserId::new(), &AuditFilter::default(), Pagination::default());
        assert_eq!(page.total, 0);
        assert_eq!(page.pages, 0);
    }

    #[test]
    fn list_between_spans_subjects_in_time_order() {
        let trail = AuditTrail::new();
        let (a, b) = (UserId::new(), UserId::new());
        trail.append(submitted(a, ts(30), "a")).unwrap();
        trail.append(submitted(b, ts(10), "b")).unwrap();
        trail.append(submitted(a, ts(50), "a2")).unwrap();

        let window = trail.list_between(ts(0), ts(40));
        let subjects: Vec<UserId> = window.iter().map(|e| e.subject).collect();
        assert_eq!(subjects, vec![b, a]);
        assert!(trail.list_between(ts(40), ts(0)).is_empty());
    }

    #[test]
    fn reconstruct_skips_failed_entries() {
        let trail = AuditTrail::new();
        let s = UserId::new();
        trail.append(submitted(s, ts(0), "first")).unwrap();
        trail.append(failed(s, ts(1))).unwrap();
        let projection = trail.reconstruct(&s).unwrap();
        assert_eq!(projection.subject.status, kyc_state::KycStatus::Pending);
        assert_eq!(
            projection.subject.identity_pointer.as_ref().map(Cid::as_str),
            Some("sha256:first")
        );
        assert_eq!(projection.last_sequence, 2);
    }

    #[test]
    fn reconstruct_replays_grants() {
        let trail = AuditTrail::new();
        let (s, org) = (UserId::new(), UserId::new());
        let grant_id = GrantId::new();
        trail
            .append(
                AuditRecord::confirmed(s, s, ts(0), AuditEvent::AccessGranted { grant_id, grantor: org })
                    .with_ledger(TxRef::parse("0x1").unwrap(), 1),
            )
            .unwrap();
        let projection = trail.reconstruct(&s).unwrap();
        assert_eq!(projection.grants.active_for(&org).map(|g| g.id), Some(grant_id));

        trail
            .append(
                AuditRecord::confirmed(s, s, ts(1), AuditEvent::AccessRevoked { grant_id, grantor: org })
                    .with_ledger(TxRef::parse("0x2").unwrap(), 2),
            )
            .unwrap();
        assert!(!trail.reconstruct(&s).unwrap().grants.is_active(&org));
    }

    #[test]
    fn tampering_is_detected() {
        let trail = AuditTrail::new();
        let s = UserId::new();
        trail.append(submitted(s, ts(0), "a")).unwrap();
        trail.append(submitted(s, ts(1), "b")).unwrap();
        assert_eq!(trail.verify_chain(&s).unwrap(), 2);

        let mut entries = trail.entries(&s);
        entries[0].timestamp = ts(99);
        assert!(matches!(
            verify_entries(&entries),
            Err(AuditError::ChainBroken { sequence: 1, .. })
        ));

        let mut entries = trail.entries(&s);
        entries.remove(0);
        assert!(matches!(AuditTrail::from_entries(entries), Err(AuditError::ChainBroken { .. })));
    }

    #[test]
    fn from_entries_restores_a_valid_log() {
        let trail = AuditTrail::new();
        let s = UserId::new();
        trail.append(submitted(s, ts(0), "a")).unwrap();
        trail.append(submitted(s, ts(1), "b")).unwrap();
        let restored = AuditTrail::from_entries(trail.entries(&s)).unwrap();
        assert_eq!(restored.reconstruct(&s).unwrap(), trail.reconstruct(&s).unwrap());
        assert_eq!(restored.append(submitted(s, ts(2), "c")).unwrap().sequence, 3);
    }
}
