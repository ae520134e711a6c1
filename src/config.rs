use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use anyhow::{Context, Result};

/// The application's configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// How long a session lives after it is issued or renewed.
    pub session_ttl: Duration,
    /// Deadline applied to every storage call.
    pub storage_timeout: Duration,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Whether cookies are marked `Secure`.
    pub secure_cookies: bool,
    /// The origin allowed by CORS.
    pub cors_origin: String,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        let session_ttl_hours: u64 = env::var("SESSION_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .context("Invalid SESSION_TTL_HOURS")?;

        if session_ttl_hours == 0 {
            anyhow::bail!("SESSION_TTL_HOURS must be at least 1");
        }

        let storage_timeout_ms: u64 = env::var("STORAGE_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .context("Invalid STORAGE_TIMEOUT_MS")?;

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            session_ttl: Duration::from_secs(session_ttl_hours * 3600),
            storage_timeout: Duration::from_millis(storage_timeout_ms),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            secure_cookies: env::var("APP_ENV")
                .unwrap_or_else(|_| "development".to_string())
                == "production",
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        })
    }
}
