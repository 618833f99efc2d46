//! Server settings for the API service
//!
//! Read from `API_*` environment variables through the `config` crate,
//! e.g. `API_PORT=3001`, `API_UPLOAD_DIR=/var/lib/community/uploads`.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: Option<String>,
    /// Directory uploaded images are written to and served from
    pub upload_dir: String,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Load settings from the environment
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3001)?
            .set_default("upload_dir", "uploads")?
            .set_default("max_upload_bytes", 5 * 1024 * 1024)?
            .add_source(Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Socket address to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults() {
        let config = ServerConfig::load().unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:3001");
        assert_eq!(config.upload_dir, "uploads");
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        unsafe {
            std::env::set_var("API_PORT", "8088");
            std::env::set_var("API_CORS_ORIGIN", "https://community.example.org");
        }

        let config = ServerConfig::load().unwrap();
        assert_eq!(config.port, 8088);
        assert_eq!(
            config.cors_origin.as_deref(),
            Some("https://community.example.org")
        );

        unsafe {
            std::env::remove_var("API_PORT");
            std::env::remove_var("API_CORS_ORIGIN");
        }
    }
}
