//! Custom error types for the common library
//!
//! This module defines the infrastructure error types shared by the
//! services: database, cache and token errors.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised while issuing or checking JWTs
#[derive(Error, Debug)]
pub enum JwtError {
    /// Missing or unreadable key material
    #[error("JWT configuration error: {0}")]
    Configuration(String),

    /// This service only holds the verification key
    #[error("JWT signing key not configured")]
    MissingSigningKey,

    /// Signature, expiry or decoding failure
    #[error("Invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    /// Token decoded but is of the wrong kind
    #[error("Unexpected token type")]
    WrongTokenType,

    /// Revocation lookup failed
    #[error("Token store error: {0}")]
    Store(#[from] redis::RedisError),
}
