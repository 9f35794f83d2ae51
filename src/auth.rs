/// Bearer sessions and the authenticated-caller extractor
use crate::{
    context::AppContext,
    error::{MediaError, MediaResult},
    permissions::UserId,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// An issued session
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Opaque access tokens stored in the `sessions` table
#[derive(Clone)]
pub struct SessionStore {
    db: SqlitePool,
}

impl SessionStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Issue a token for `user_id` valid for `ttl`
    pub async fn create_session(&self, user_id: UserId, ttl: Duration) -> MediaResult<Session> {
        let access_token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let created_at = Utc::now();
        let expires_at = created_at + ttl;

        sqlx::query(
            "INSERT INTO sessions (access_token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&access_token)
        .bind(user_id)
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(Session {
            access_token,
            user_id,
            created_at,
            expires_at,
        })
    }

    /// Resolve a token to its caller
    pub async fn validate(&self, token: &str) -> MediaResult<Caller> {
        let row = sqlx::query("SELECT user_id, expires_at FROM sessions WHERE access_token = ?1")
            .bind(token)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| MediaError::AuthenticationRequired("Invalid access token".to_string()))?;

        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
        if expires_at <= Utc::now() {
            return Err(MediaError::AuthenticationRequired(
                "Access token has expired".to_string(),
            ));
        }

        Ok(Caller {
            user_id: row.try_get("user_id")?,
        })
    }

    pub async fn revoke(&self, token: &str) -> MediaResult<()> {
        sqlx::query("DELETE FROM sessions WHERE access_token = ?1")
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Drop expired sessions, returning how many were removed
    pub async fn cleanup_expired(&self) -> MediaResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Authenticated caller, extracted from a valid bearer session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<AppContext> for Caller {
    type Rejection = MediaError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or_else(|| {
            MediaError::AuthenticationRequired("Missing authorization header".to_string())
        })?;

        state.sessions.validate(&token).await
    }
}
