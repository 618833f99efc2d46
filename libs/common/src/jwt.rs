//! JWT issuing and validation shared by the auth and api services
//!
//! Tokens are signed with HS256 when `JWT_SECRET` is set, otherwise with
//! RS256 from a PEM key pair. The api service only needs the verification
//! half, so the signing key is optional. Revocation is tracked in Redis by
//! token id (`jti`) for the token's remaining lifetime.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{cache::RedisPool, error::JwtError};

/// Key material for the configured algorithm
#[derive(Debug, Clone)]
pub enum JwtKeys {
    /// Shared secret, HS256
    Secret(String),
    /// PEM encoded RSA keys, RS256
    Rsa {
        private_key: Option<String>,
        public_key: String,
    },
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub keys: JwtKeys,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: shared secret; selects HS256 when present
    /// - `JWT_PRIVATE_KEY`: RSA private key (PEM text or file path), optional
    /// - `JWT_PUBLIC_KEY`: RSA public key (PEM text or file path)
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 900)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self, JwtError> {
        let keys = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => JwtKeys::Secret(secret),
            _ => {
                let public_key = std::env::var("JWT_PUBLIC_KEY").map_err(|_| {
                    JwtError::Configuration(
                        "either JWT_SECRET or JWT_PUBLIC_KEY must be set".to_string(),
                    )
                })?;
                let private_key = std::env::var("JWT_PRIVATE_KEY")
                    .ok()
                    .map(|value| read_pem(&value))
                    .transpose()?;

                JwtKeys::Rsa {
                    private_key,
                    public_key: read_pem(&public_key)?,
                }
            }
        };

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(900);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(604_800);

        Ok(JwtConfig {
            keys,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}

/// Accept either inline PEM text or a path to a PEM file
fn read_pem(value: &str) -> Result<String, JwtError> {
    if value.starts_with("-----BEGIN") {
        return Ok(value.to_string());
    }

    std::fs::read_to_string(value)
        .map(|s| s.trim().to_string())
        .map_err(|e| JwtError::Configuration(format!("Failed to read key file {}: {}", value, e)))
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Token ID, used for sessions and revocation
    pub jti: Uuid,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
}

impl Claims {
    /// Seconds until this token expires, zero once it has
    pub fn remaining_lifetime(&self) -> u64 {
        self.exp.saturating_sub(now())
    }
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// A freshly signed token together with its claims
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    algorithm: Algorithm,
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self, JwtError> {
        let (algorithm, encoding_key, decoding_key) = match &config.keys {
            JwtKeys::Secret(secret) => (
                Algorithm::HS256,
                Some(EncodingKey::from_secret(secret.as_bytes())),
                DecodingKey::from_secret(secret.as_bytes()),
            ),
            JwtKeys::Rsa {
                private_key,
                public_key,
            } => (
                Algorithm::RS256,
                private_key
                    .as_deref()
                    .map(|pem| EncodingKey::from_rsa_pem(pem.as_bytes()))
                    .transpose()?,
                DecodingKey::from_rsa_pem(public_key.as_bytes())?,
            ),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;

        Ok(JwtService {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    /// Generate an access token for a user
    pub fn generate_access_token(&self, user_id: Uuid) -> Result<IssuedToken, JwtError> {
        self.issue(user_id, TokenType::Access, self.config.access_token_expiry)
    }

    /// Generate a refresh token for a user
    pub fn generate_refresh_token(&self, user_id: Uuid) -> Result<IssuedToken, JwtError> {
        self.issue(user_id, TokenType::Refresh, self.config.refresh_token_expiry)
    }

    fn issue(&self, user_id: Uuid, token_type: TokenType, ttl: u64) -> Result<IssuedToken, JwtError> {
        let key = self
            .encoding_key
            .as_ref()
            .ok_or(JwtError::MissingSigningKey)?;

        let iat = now();
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat,
            exp: iat + ttl,
            token_type,
        };

        let token = encode(&Header::new(self.algorithm), &claims, key)?;
        Ok(IssuedToken { token, claims })
    }

    /// Validate a token and check it is of the expected kind
    pub fn validate_token(&self, token: &str, expected: TokenType) -> Result<Claims, JwtError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)?.claims;

        if claims.token_type != expected {
            return Err(JwtError::WrongTokenType);
        }

        Ok(claims)
    }

    /// Check if a token id has been revoked
    pub async fn is_blacklisted(&self, redis_pool: &RedisPool, claims: &Claims) -> Result<bool, JwtError> {
        Ok(redis_pool.exists(&revoked_key(claims.jti)).await?)
    }

    /// Revoke a token for its remaining lifetime
    pub async fn blacklist(&self, redis_pool: &RedisPool, claims: &Claims) -> Result<(), JwtError> {
        let ttl = claims.remaining_lifetime();
        if ttl == 0 {
            return Ok(());
        }

        redis_pool.set(&revoked_key(claims.jti), "1", Some(ttl)).await?;
        Ok(())
    }

    /// Get the access token expiry time
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    /// Get the refresh token expiry time
    pub fn refresh_token_expiry(&self) -> u64 {
        self.config.refresh_token_expiry
    }
}

fn revoked_key(jti: Uuid) -> String {
    format!("revoked_token:{}", jti)
}

fn now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(JwtConfig {
            keys: JwtKeys::Secret("test-secret-with-enough-entropy".to_string()),
            access_token_expiry: 900,
            refresh_token_expiry: 3600,
        })
        .expect("valid config")
    }

    #[test]
    fn test_access_token_validates() {
        let jwt = service();
        let user_id = Uuid::new_v4();

        let issued = jwt.generate_access_token(user_id).unwrap();
        let claims = jwt.validate_token(&issued.token, TokenType::Access).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.jti, issued.claims.jti);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_token_rejected_as_access_token() {
        let jwt = service();
        let issued = jwt.generate_refresh_token(Uuid::new_v4()).unwrap();

        let result = jwt.validate_token(&issued.token, TokenType::Access);
        assert!(matches!(result, Err(JwtError::WrongTokenType)));
    }

    #[test]
    fn test_token_from_other_secret_is_invalid() {
        let other = JwtService::new(JwtConfig {
            keys: JwtKeys::Secret("another-secret".to_string()),
            access_token_expiry: 900,
            refresh_token_expiry: 3600,
        })
        .unwrap();

        let issued = other.generate_access_token(Uuid::new_v4()).unwrap();
        let result = service().validate_token(&issued.token, TokenType::Access);
        assert!(matches!(result, Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let jwt = service();
        let claims = Claims {
            sub: Uuid::new_v4(),
            jti: Uuid::new_v4(),
            iat: now() - 7200,
            exp: now() - 3600,
            token_type: TokenType::Access,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            jwt.encoding_key.as_ref().unwrap(),
        )
        .unwrap();

        assert!(jwt.validate_token(&token, TokenType::Access).is_err());
        assert_eq!(claims.remaining_lifetime(), 0);
    }

    #[test]
    fn test_each_token_gets_a_fresh_id() {
        let jwt = service();
        let user_id = Uuid::new_v4();

        let first = jwt.generate_refresh_token(user_id).unwrap();
        let second = jwt.generate_refresh_token(user_id).unwrap();
        assert_ne!(first.claims.jti, second.claims.jti);
    }
}
