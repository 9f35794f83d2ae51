/// Role-based authority backed by SQLite
use crate::{
    error::{MediaError, MediaResult},
    permissions::{AuthorizationAuthority, GroupId, Permission, Scope, UserId},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// Answers permission checks from `roles`, `role_permissions` and `user_roles`
///
/// A role assigned without a group applies everywhere, including inside every
/// group. A role assigned to a group only answers checks scoped to that group.
#[derive(Clone)]
pub struct SqlAuthority {
    db: SqlitePool,
}

impl SqlAuthority {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a role carrying the given permissions
    pub async fn create_role(&self, name: &str, permissions: &[Permission]) -> MediaResult<i64> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query("INSERT INTO roles (name) VALUES (?1)")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    MediaError::Conflict(format!("Role already exists: {}", name))
                }
                _ => MediaError::Database(e),
            })?;
        let role_id = result.last_insert_rowid();

        for permission in permissions {
            sqlx::query("INSERT INTO role_permissions (role_id, permission) VALUES (?1, ?2)")
                .bind(role_id)
                .bind(permission.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(role_id)
    }

    /// Assign a role to a user, globally or within one group
    pub async fn assign_role(&self, user_id: UserId, role_id: i64, scope: Scope) -> MediaResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id, group_id, granted_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .bind(scope_group(scope))
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

fn scope_group(scope: Scope) -> Option<GroupId> {
    match scope {
        Scope::Global => None,
        Scope::ScopedTo(group_id) => Some(group_id),
    }
}

#[async_trait]
impl AuthorizationAuthority for SqlAuthority {
    async fn check_permission(
        &self,
        user_id: UserId,
        permission: Permission,
        scope: Scope,
    ) -> MediaResult<bool> {
        // A NULL scope group never equals a row's group_id, so global checks
        // only match global assignments.
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM user_roles ur
                JOIN role_permissions rp ON rp.role_id = ur.role_id
                WHERE ur.user_id = ?1
                  AND rp.permission = ?2
                  AND (ur.group_id IS NULL OR ur.group_id = ?3)
            ) AS allowed
            "#,
        )
        .bind(user_id)
        .bind(permission.as_str())
        .bind(scope_group(scope))
        .fetch_one(&self.db)
        .await
        .map_err(|e| MediaError::AuthorityUnavailable(e.to_string()))?;

        let allowed: i64 = row
            .try_get("allowed")
            .map_err(|e| MediaError::AuthorityUnavailable(e.to_string()))?;
        Ok(allowed != 0)
    }
}
