//! # Access Grants
//!
//! A grant lets one organization read one subject's identity. The
//! [`GrantBook`] for a subject keeps every grant ever issued, in issue
//! order, and enforces that a grantor holds at most one active grant.

use kyc_core::{GrantId, Timestamp, TxRef, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Grant status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Active,
    Revoked,
}

/// One grant record. Each transition carries its ledger reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub id: GrantId,
    pub grantor: UserId,
    pub subject: UserId,
    pub status: GrantStatus,
    pub granted_tx: TxRef,
    pub granted_at: Timestamp,
    pub revoked_tx: Option<TxRef>,
    pub revoked_at: Option<Timestamp>,
}

impl AccessGrant {
    pub fn is_active(&self) -> bool {
        self.status == GrantStatus::Active
    }
}

/// Errors from grant book updates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrantError {
    /// The grantor already holds an active grant on this subject.
    #[error("{grantor} already holds active {existing}")]
    AlreadyActive { grantor: UserId, existing: GrantId },

    /// Nothing to revoke.
    #[error("{grantor} holds no active grant")]
    NoActiveGrant { grantor: UserId },
}

/// Grant history for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrantBook {
    grants: Vec<AccessGrant>,
}

impl GrantBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// The grantor's active grant, if any.
    pub fn active_for(&self, grantor: &UserId) -> Option<&AccessGrant> {
        self.grants
            .iter()
            .find(|g| g.grantor == *grantor && g.is_active())
    }

    pub fn is_active(&self, grantor: &UserId) -> bool {
        self.active_for(grantor).is_some()
    }

    /// Append a new active grant.
    pub fn grant(
        &mut self,
        id: GrantId,
        grantor: UserId,
        subject: UserId,
        tx: TxRef,
        at: Timestamp,
    ) -> Result<&AccessGrant, GrantError> {
        if let Some(existing) = self.active_for(&grantor) {
            return Err(GrantError::AlreadyActive {
                grantor,
                existing: existing.id,
            });
        }
        self.grants.push(AccessGrant {
            id,
            grantor,
            subject,
            status: GrantStatus::Active,
            granted_tx: tx,
            granted_at: at,
            revoked_tx: None,
            revoked_at: None,
        });
        self.grants
            .last()
            .ok_or(GrantError::NoActiveGrant { grantor })
    }

    /// Mark the grantor's active grant revoked.
    pub fn revoke(
        &mut self,
        grantor: &UserId,
        tx: TxRef,
        at: Timestamp,
    ) -> Result<&AccessGrant, GrantError> {
        let grant = self
            .grants
            .iter_mut()
            .find(|g| g.grantor == *grantor && g.is_active())
            .ok_or(GrantError::NoActiveGrant { grantor: *grantor })?;
        grant.status = GrantStatus::Revoked;
        grant.revoked_tx = Some(tx);
        grant.revoked_at = Some(at);
        Ok(grant)
    }

    /// Active grants in issue order.
    pub fn active(&self) -> impl Iterator<Item = &AccessGrant> {
        self.grants.iter().filter(|g| g.is_active())
    }

    /// Every grant ever issued, in issue order.
    pub fn history(&self) -> &[AccessGrant] {
        &self.grants
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
