//! Error type for the authentication service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::JwtError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Payload failed validation
    #[error("{0}")]
    Validation(String),

    /// Wrong email or password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Missing, invalid or revoked token
    #[error("Unauthorized")]
    Unauthorized,

    /// Email already registered
    #[error("Email is already registered")]
    EmailTaken,

    /// Too many failed login attempts
    #[error("Too many login attempts, try again later")]
    TooManyRequests,

    /// Account no longer exists
    #[error("User not found")]
    NotFound,

    /// Anything else; details are logged, not returned
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::Internal(format!("database: {}", e))
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(e: redis::RedisError) -> Self {
        AuthError::Internal(format!("redis: {}", e))
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Invalid(_) | JwtError::WrongTokenType => AuthError::Unauthorized,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::Internal(detail) => {
                error!("Request failed: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::EmailTaken.status(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::TooManyRequests.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_token_errors_become_unauthorized() {
        let err: AuthError = JwtError::WrongTokenType.into();
        assert!(matches!(err, AuthError::Unauthorized));

        let err: AuthError = JwtError::MissingSigningKey.into();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let response = AuthError::Internal("password column missing".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
