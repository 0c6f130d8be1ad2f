//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Bearer token for the admin routes; `None` disables them.
    pub admin_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `GATEWAY_ADDR` | Server bind address | `0.0.0.0:8080` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:journey.db?mode=rwc` |
    /// | `ADMIN_TOKEN` | Admin bearer token | (admin routes disabled) |
    ///
    /// `MEDIA_BASE_URL` is read by the engine configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("GATEWAY_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url = env::var("SQLITE_PATH")
            .unwrap_or_else(|_| "sqlite:journey.db?mode=rwc".to_string());

        let admin_token = env::var("ADMIN_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(Self {
            addr,
            database_url,
            admin_token,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid GATEWAY_ADDR format")]
    InvalidAddr,
}
