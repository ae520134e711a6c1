use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// The application's error type.
///
/// Storage failures are translated into one of these kinds at the store
/// boundary. The `String` payloads of `Unavailable` and `Internal` are for
/// logs only and never reach a response body.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input, e.g. a friend request to oneself.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A uniqueness violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A missing user, request, session or subscription.
    #[error("Resource not found")]
    NotFound,

    /// No session, or the session has expired.
    #[error("Authentication required")]
    Unauthorized,

    /// Authenticated, but not the owner of the resource.
    #[error("Forbidden")]
    Forbidden,

    /// Login failure. Unknown logins and wrong passwords both end up here.
    #[error("Invalid login or password")]
    InvalidCredentials,

    /// A storage dependency failed.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A storage call exceeded its deadline.
    #[error("Storage timeout")]
    Timeout,

    /// An internal invariant was broken.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Whether a caller may retry the failed operation.
    ///
    /// Only storage failures qualify, and only for reads: a mutating call
    /// has to re-check state before it is attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Unavailable(_) | AppError::Timeout)
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        match e.code() {
            Some(code) if *code == SqlState::UNIQUE_VIOLATION => {
                tracing::debug!("Unique constraint rejected write: {}", e);
                AppError::Conflict("Resource already exists".to_string())
            }
            Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => {
                tracing::debug!("Foreign key rejected write: {}", e);
                AppError::NotFound
            }
            _ => AppError::Unavailable(format!("postgres: {}", e)),
        }
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        match e {
            deadpool_postgres::PoolError::Timeout(_) => AppError::Timeout,
            deadpool_postgres::PoolError::Backend(e) => AppError::from(e),
            other => AppError::Unavailable(format!("pool: {}", other)),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_timeout() {
            AppError::Timeout
        } else {
            AppError::Unavailable(format!("redis: {}", e))
        }
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidArgument(ref msg) => {
                tracing::debug!("Invalid argument: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Conflict(ref msg) => {
                tracing::debug!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg.clone())
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }

            AppError::Unauthorized => {
                tracing::warn!("Unauthenticated request rejected");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }

            AppError::Forbidden => {
                tracing::warn!("Authorization failed");
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }

            AppError::InvalidCredentials => {
                tracing::warn!("Login rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    "Invalid login or password".to_string(),
                )
            }

            AppError::Unavailable(ref msg) => {
                tracing::error!("Storage unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }

            AppError::Timeout => {
                tracing::error!("Storage call timed out");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "Service temporarily unavailable".to_string(),
                )
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (
            status,
            [(http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_failures_are_retryable() {
        assert!(AppError::Timeout.is_retryable());
        assert!(AppError::Unavailable("down".into()).is_retryable());
        assert!(!AppError::Conflict("dup".into()).is_retryable());
        assert!(!AppError::NotFound.is_retryable());
        assert!(!AppError::InvalidCredentials.is_retryable());
    }

    #[test]
    fn storage_details_stay_out_of_the_response() {
        let response = AppError::Unavailable("password=hunter2".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn credential_failures_map_to_401() {
        let response = AppError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
