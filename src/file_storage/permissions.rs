//! # Storage Permissions
//!
//! Per-object, per-user capability grants.

use serde::{Deserialize, Serialize};

/// A single capability a grant can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Write,
    Delete,
}

impl Capability {
    /// Column in the `permissions` table holding this capability
    pub fn column(&self) -> &'static str {
        match self {
            Capability::Read => "can_read",
            Capability::Write => "can_write",
            Capability::Delete => "can_delete",
        }
    }
}

/// One `permissions` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub file_id: i64,
    pub user: String,
    pub can_read: bool,
    pub can_write: bool,
    pub can_delete: bool,
}

impl PermissionGrant {
    /// Full grant the uploader receives
    pub fn owner(file_id: i64, user: &str) -> Self {
        Self {
            file_id,
            user: user.to_string(),
            can_read: true,
            can_write: true,
            can_delete: true,
        }
    }

    /// Check whether this grant carries `capability`
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Read => self.can_read,
            Capability::Write => self.can_write,
            Capability::Delete => self.can_delete,
        }
    }
}
