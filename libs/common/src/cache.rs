//! Redis cache module for the community services
//!
//! Sessions, revoked token ids and nothing else live here; every value is a
//! short string with an optional TTL.

use redis::{AsyncCommands, Client, RedisResult};
use tracing::info;

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> Self {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        RedisConfig { url }
    }
}

/// Redis client handle; connections are multiplexed per call
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Open a client for the configured URL. No connection is made until
    /// the first command.
    pub fn new(config: &RedisConfig) -> RedisResult<Self> {
        let client = Client::open(config.url.clone())?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { client })
    }

    async fn get_connection(&self) -> RedisResult<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }

    /// Set a key-value pair in Redis with optional TTL
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> RedisResult<()> {
        let mut conn = self.get_connection().await?;

        match ttl_seconds {
            // SETEX rejects a zero TTL
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }

        Ok(())
    }

    /// Get a value from Redis by key
    pub async fn get(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        conn.get(key).await
    }

    /// Check whether a key is present
    pub async fn exists(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.get_connection().await?;
        conn.exists(key).await
    }

    /// Delete a key from Redis; `true` when this call removed it
    pub async fn delete(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.get_connection().await?;
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> RedisResult<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_opens_without_connecting() {
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
        };
        assert!(RedisPool::new(&config).is_ok());
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let config = RedisConfig {
            url: "not a url".to_string(),
        };
        assert!(RedisPool::new(&config).is_err());
    }
}
