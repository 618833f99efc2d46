//! Server settings for the authentication service
//!
//! Read from `AUTH_*` environment variables through the `config` crate,
//! e.g. `AUTH_PORT=3000`, `AUTH_COOKIE_SECURE=true`.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed browser origin; the refresh cookie needs credentialed CORS
    pub cors_origin: Option<String>,
    /// Mark the refresh cookie `Secure` (HTTPS only)
    pub cookie_secure: bool,
}

impl ServerConfig {
    /// Load settings from the environment
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("cookie_secure", false)?
            .add_source(Environment::with_prefix("AUTH").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Socket address to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
