//! Refresh-token sessions stored in Redis
//!
//! One key per issued refresh token: `session:{user_id}:{jti}`. A refresh
//! token is only honoured while its key exists, so deleting the key ends
//! the session even before the token expires.

use common::{cache::RedisPool, jwt::Claims};
use redis::RedisResult;
use tracing::info;

/// Session manager for handling user sessions in Redis
#[derive(Clone)]
pub struct SessionManager {
    redis_pool: RedisPool,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(redis_pool: RedisPool) -> Self {
        Self { redis_pool }
    }

    /// Record a session for a newly issued refresh token
    pub async fn create_session(&self, claims: &Claims) -> RedisResult<()> {
        info!("Creating session for user: {}", claims.sub);

        self.redis_pool
            .set(
                &session_key(claims),
                &claims.iat.to_string(),
                Some(claims.remaining_lifetime()),
            )
            .await
    }

    /// End the session belonging to a refresh token
    ///
    /// Returns `false` when the session was already gone. Only one caller
    /// can observe `true` for a given token.
    pub async fn delete_session(&self, claims: &Claims) -> RedisResult<bool> {
        info!("Deleting session for user: {}", claims.sub);
        self.redis_pool.delete(&session_key(claims)).await
    }

    /// Get Redis health status
    pub async fn health_check(&self) -> RedisResult<bool> {
        self.redis_pool.health_check().await
    }
}

fn session_key(claims: &Claims) -> String {
    format!("session:{}:{}", claims.sub, claims.jti)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::jwt::TokenType;
    use uuid::Uuid;

    #[test]
    fn test_session_key_is_per_token() {
        let user = Uuid::new_v4();
        let claims = |jti| Claims {
            sub: user,
            jti,
            iat: 0,
            exp: 10,
            token_type: TokenType::Refresh,
        };

        let first = session_key(&claims(Uuid::new_v4()));
        let second = session_key(&claims(Uuid::new_v4()));

        assert!(first.starts_with(&format!("session:{}:", user)));
        assert_ne!(first, second);
    }
}
