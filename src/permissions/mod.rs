/// Permission gate
///
/// Every media operation asks the gate first. A denial is returned before any
/// validation, storage or database work starts.

pub mod sql;

pub use sql::SqlAuthority;

use crate::error::{MediaError, MediaResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub type UserId = i64;
pub type GroupId = i64;

/// Named permissions understood by the authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageItems,
    ViewItems,
    ManageGroupUsers,
    ViewGroups,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageItems => "manage_items",
            Permission::ViewItems => "view_items",
            Permission::ManageGroupUsers => "manage_group_users",
            Permission::ViewGroups => "view_groups",
        }
    }

    pub fn from_str(s: &str) -> MediaResult<Self> {
        match s {
            "manage_items" => Ok(Permission::ManageItems),
            "view_items" => Ok(Permission::ViewItems),
            "manage_group_users" => Ok(Permission::ManageGroupUsers),
            "view_groups" => Ok(Permission::ViewGroups),
            _ => Err(MediaError::Validation(format!("Invalid permission: {}", s))),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization boundary of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    ScopedTo(GroupId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::ScopedTo(group_id) => write!(f, "group {}", group_id),
        }
    }
}

/// Source of truth for who may do what
///
/// `Ok(false)` is a denial. `Err` is reserved for the authority being
/// unreachable and must never be used to signal a denial.
#[async_trait]
pub trait AuthorizationAuthority: Send + Sync {
    async fn check_permission(
        &self,
        user_id: UserId,
        permission: Permission,
        scope: Scope,
    ) -> MediaResult<bool>;
}

/// Gate in front of every media operation
#[derive(Clone)]
pub struct PermissionGate {
    authority: Arc<dyn AuthorizationAuthority>,
}

impl PermissionGate {
    pub fn new(authority: Arc<dyn AuthorizationAuthority>) -> Self {
        Self { authority }
    }

    /// Ask the authority without turning a denial into an error
    pub async fn check(
        &self,
        user_id: UserId,
        permission: Permission,
        scope: Scope,
    ) -> MediaResult<bool> {
        self.authority
            .check_permission(user_id, permission, scope)
            .await
            .map_err(|e| match e {
                MediaError::AuthorityUnavailable(_) => e,
                other => MediaError::AuthorityUnavailable(other.to_string()),
            })
    }

    /// Fail with `PermissionDenied` unless the caller holds `permission` in `scope`
    pub async fn require(
        &self,
        user_id: UserId,
        permission: Permission,
        scope: Scope,
    ) -> MediaResult<()> {
        if self.check(user_id, permission, scope).await? {
            Ok(())
        } else {
            tracing::debug!(user_id, %permission, %scope, "permission denied");
            Err(MediaError::PermissionDenied(format!(
                "{} requires {} ({})",
                user_id, permission, scope
            )))
        }
    }
}
