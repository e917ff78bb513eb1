//! # Identifier Newtypes
//!
//! Newtype wrappers for every identifier that crosses a component
//! boundary. You cannot pass a `Cid` where a `TxRef` is expected, or a
//! `GrantId` where a `UserId` is expected.
//!
//! Subjects, organizations and operators share the single `UserId`
//! namespace: an access check compares the requester against the subject
//! directly, so both sides must be the same type.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Identifier of a principal (subject, organization, or operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

/// Identifier of a single access grant record.
///
/// A re-grant after revocation mints a fresh `GrantId`; revoked records
/// are never revived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantId(pub Uuid);

impl UserId {
    /// Generate a new random user identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl GrantId {
    /// Generate a new random grant identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for GrantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

impl std::fmt::Display for GrantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "grant:{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = CoreError;

    /// Accepts both the bare UUID and the `user:`-prefixed display form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("user:").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| CoreError::InvalidIdentifier {
                kind: "user id",
                reason: format!("{s:?}: {e}"),
            })
    }
}

/// Content identifier of an immutable blob in the content-addressed store.
///
/// Opaque to the vault beyond basic shape validation: non-empty, ASCII,
/// no whitespace, no path separators. The store decides the encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    /// Maximum accepted length of a content identifier.
    pub const MAX_LEN: usize = 128;

    /// Validate and wrap a content identifier.
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        let invalid = |reason: &str| CoreError::InvalidIdentifier {
            kind: "cid",
            reason: format!("{reason}: {s:?}"),
        };
        if s.is_empty() {
            return Err(invalid("empty"));
        }
        if s.len() > Self::MAX_LEN {
            return Err(invalid("too long"));
        }
        if !s.is_ascii() || s.chars().any(|c| c.is_ascii_whitespace() || c == '/') {
            return Err(invalid("must be ascii without whitespace or '/'"));
        }
        Ok(Self(s))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Cid {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<Cid> for String {
    fn from(c: Cid) -> Self {
        c.0
    }
}

/// Reference to a confirmed ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxRef(String);

impl TxRef {
    /// Validate and wrap a transaction reference.
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(CoreError::InvalidIdentifier {
                kind: "tx ref",
                reason: "empty".to_string(),
            });
        }
        Ok(Self(s))
    }

    /// Borrow the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TxRef {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<TxRef> for String {
    fn from(t: TxRef) -> Self {
        t.0
    }
}
