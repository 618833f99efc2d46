//! User repository for credential storage

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AuthError,
    models::{NewUser, User},
};

const USER_COLUMNS: &str = "id, name, email, password_hash, bio, location, skills, avatar_url, \
                            trust_score, total_reviews, created_at, updated_at";

/// Hash a plain-text password with Argon2id and a random salt
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a plain-text password against a stored hash
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AuthError::Internal(format!("Failed to parse password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a user together with its presence row
    pub async fn create(&self, new_user: &NewUser) -> Result<User, AuthError> {
        info!("Creating new user: {}", new_user.email);

        let password_hash = hash_password(&new_user.password)?;
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(new_user.name.trim())
        .bind(new_user.email.trim().to_lowercase())
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            let taken = e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            if taken {
                AuthError::EmailTaken
            } else {
                AuthError::from(e)
            }
        })?;

        sqlx::query("INSERT INTO user_status (user_id, is_online) VALUES ($1, FALSE)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    /// Find a user by email, case-insensitively
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Replace a user's password
    pub async fn update_password(&self, id: Uuid, new_password: &str) -> Result<(), AuthError> {
        info!("Updating password for user: {}", id);

        let password_hash = hash_password(new_password)?;
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(&password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse 42").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse 42", &hash).unwrap());
        assert!(!verify_password("wrong horse 42", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let first = hash_password("password123").unwrap();
        let second = hash_password("password123").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        assert!(verify_password("password123", "not-a-hash").is_err());
    }
}
