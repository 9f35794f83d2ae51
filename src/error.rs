/// Unified error types for the media service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error taxonomy exposed to callers
///
/// Every `MediaError` projects onto exactly one kind; callers branch on the
/// kind rather than on the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    AuthenticationRequired,
    PermissionDenied,
    ValidationError,
    ResourceNotFound,
    ConflictError,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticationRequired => "AuthenticationRequired",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::ResourceNotFound => "ResourceNotFound",
            ErrorKind::ConflictError => "ConflictError",
            ErrorKind::InternalError => "InternalError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ErrorKind::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorKind::ConflictError => StatusCode::CONFLICT,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compensating action that could not be completed
///
/// The object named by `key` is left behind in the store and must be
/// reclaimed out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationFailure {
    pub key: String,
    pub reason: String,
}

/// Main error type for the media service
#[derive(Error, Debug)]
pub enum MediaError {
    /// Missing, invalid or expired credentials
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// The authority answered and the answer was no
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The authority could not be reached; distinct from a denial
    #[error("Authorization authority unavailable: {0}")]
    AuthorityUnavailable(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invariant violation attempted
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Object store errors
    #[error("Object storage error: {0}")]
    Storage(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// An error whose cleanup left objects behind
    #[error("{error}")]
    Compensated {
        error: Box<MediaError>,
        failures: Vec<CompensationFailure>,
    },
}

impl MediaError {
    /// Project this error onto the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::AuthenticationRequired(_) => ErrorKind::AuthenticationRequired,
            MediaError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            MediaError::Validation(_) => ErrorKind::ValidationError,
            MediaError::NotFound(_) => ErrorKind::ResourceNotFound,
            MediaError::Conflict(_) => ErrorKind::ConflictError,
            MediaError::AuthorityUnavailable(_)
            | MediaError::Storage(_)
            | MediaError::Database(_)
            | MediaError::Io(_)
            | MediaError::Internal(_) => ErrorKind::InternalError,
            MediaError::Compensated { error, .. } => error.kind(),
        }
    }

    /// Attach the outcome of a compensation pass
    ///
    /// An empty list leaves the error unchanged.
    pub fn with_compensation(self, failures: Vec<CompensationFailure>) -> Self {
        if failures.is_empty() {
            return self;
        }
        match self {
            MediaError::Compensated {
                error,
                failures: mut existing,
            } => {
                existing.extend(failures);
                MediaError::Compensated {
                    error,
                    failures: existing,
                }
            }
            other => MediaError::Compensated {
                error: Box::new(other),
                failures,
            },
        }
    }

    /// Objects that compensation could not remove
    pub fn compensation_failures(&self) -> &[CompensationFailure] {
        match self {
            MediaError::Compensated { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert MediaError to HTTP response
impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match kind {
            // Don't leak details
            ErrorKind::InternalError => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        if kind == ErrorKind::InternalError {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(ErrorResponse {
            error: kind.as_str().to_string(),
            message,
        });

        (kind.status(), body).into_response()
    }
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_projection() {
        assert_eq!(
            MediaError::PermissionDenied("x".into()).kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            MediaError::AuthorityUnavailable("x".into()).kind(),
            ErrorKind::InternalError
        );
        assert_eq!(MediaError::Storage("x".into()).kind(), ErrorKind::InternalError);
        assert_eq!(
            MediaError::Validation("x".into()).kind(),
            ErrorKind::ValidationError
        );
    }

    #[test]
    fn test_compensation_keeps_original_error() {
        let failure = CompensationFailure {
            key: "items/1/a.png".to_string(),
            reason: "timed out".to_string(),
        };
        let err = MediaError::Storage("put failed".into()).with_compensation(vec![failure.clone()]);

        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert_eq!(err.to_string(), "Object storage error: put failed");
        assert_eq!(err.compensation_failures(), &[failure]);
    }

    #[test]
    fn test_empty_compensation_is_noop() {
        let err = MediaError::Conflict("logo changed".into()).with_compensation(Vec::new());
        assert!(matches!(err, MediaError::Conflict(_)));
        assert!(err.compensation_failures().is_empty());
    }

    #[test]
    fn test_status_mapping() {
        let response = MediaError::NotFound("item 7".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = MediaError::Internal("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
