//! # Role Directory
//!
//! Resolves a principal to its role. Roles are ordered: an operator can
//! do everything an organization can.

use std::collections::HashMap;

use async_trait::async_trait;
use kyc_core::UserId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Role of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A person undergoing verification.
    Subject,
    /// May be granted read access to subjects' identities.
    Organization,
    /// Reviews submissions and reads everything.
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Organization => "organization",
            Self::Operator => "operator",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subject" => Ok(Self::Subject),
            "organization" => Ok(Self::Organization),
            "operator" => Ok(Self::Operator),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

/// Identity and role lookup owned by the surrounding system.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// The principal's role, or `None` if the directory does not know it.
    async fn resolve_role(&self, user: &UserId) -> Option<Role>;
}

/// In-memory directory.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    roles: RwLock<HashMap<UserId, Role>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) a principal.
    pub fn register(&self, user: UserId, role: Role) {
        self.roles.write().insert(user, role);
    }

    /// Register a fresh principal and return its id.
    pub fn enroll(&self, role: Role) -> UserId {
        let id = UserId::new();
        self.register(id, role);
        id
    }

    pub fn remove(&self, user: &UserId) -> Option<Role> {
        self.roles.write().remove(user)
    }

    pub fn len(&self) -> usize {
        self.roles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RoleDirectory for StaticDirectory {
    async fn resolve_role(&self, user: &UserId) -> Option<Role> {
        self.roles.read().get(user).copied()
    }
}
