//! Configuration management for CRM Service
//!
//! Loads settings from environment variables, with a `.env` file picked up in
//! debug builds. When `DATABASE_URL` is unset the service runs against the
//! in-memory store, which is only meant for local development.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerSettings,
    pub database: Option<DatabaseSettings>,
    pub oauth: OAuthSettings,
    pub session: SessionSettings,
    pub realtime: RealtimeSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
            info!("Loaded .env file for development");
        }

        Ok(Config {
            server: ServerSettings::from_env()?,
            database: DatabaseSettings::from_env()?,
            oauth: OAuthSettings::from_env()?,
            session: SessionSettings::from_env()?,
            realtime: RealtimeSettings::from_env()?,
        })
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .context("Invalid SERVER_PORT")?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// PostgreSQL connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl DatabaseSettings {
    fn from_env() -> Result<Option<Self>> {
        let url = match env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => return Ok(None),
        };

        Ok(Some(Self {
            url,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,
            acquire_timeout: env::var("DATABASE_ACQUIRE_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_ACQUIRE_TIMEOUT")?,
        }))
    }
}

/// Facebook OAuth settings
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct OAuthSettings {
    pub facebook_app_id: String,
    pub facebook_app_secret: String,
    pub redirect_uri: String,
    pub graph_api_version: String,
}

impl std::fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("facebook_app_id", &self.facebook_app_id)
            .field("facebook_app_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("graph_api_version", &self.graph_api_version)
            .finish()
    }
}

impl OAuthSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            facebook_app_id: env::var("FACEBOOK_APP_ID")
                .context("FACEBOOK_APP_ID must be set")?,
            facebook_app_secret: env::var("FACEBOOK_APP_SECRET")
                .context("FACEBOOK_APP_SECRET must be set")?,
            redirect_uri: env::var("OAUTH_REDIRECT_URI").unwrap_or_else(|_| {
                "http://localhost:5000/auth/facebook/callback".to_string()
            }),
            graph_api_version: env::var("FACEBOOK_GRAPH_VERSION")
                .unwrap_or_else(|_| "v18.0".to_string()),
        })
    }
}

/// Session cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub ttl_days: i64,
    pub cookie_secure: bool,
    pub prune_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_days: 7,
            cookie_secure: false,
            prune_interval_secs: 3600,
        }
    }
}

impl SessionSettings {
    fn from_env() -> Result<Self> {
        let ttl_days: i64 = env::var("SESSION_TTL_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .context("Invalid SESSION_TTL_DAYS")?;
        if ttl_days <= 0 {
            anyhow::bail!("SESSION_TTL_DAYS must be positive, got {}", ttl_days);
        }

        Ok(Self {
            ttl_days,
            cookie_secure: env::var("SESSION_COOKIE_SECURE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            prune_interval_secs: env::var("SESSION_PRUNE_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .context("Invalid SESSION_PRUNE_INTERVAL_SECS")?,
        })
    }
}

/// Real-time fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    /// Per-observer queue depth before a slow observer is evicted
    pub observer_buffer: usize,
    /// How often an open change feed re-checks its session
    pub session_recheck_secs: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            observer_buffer: 256,
            session_recheck_secs: 5,
        }
    }
}

impl RealtimeSettings {
    fn from_env() -> Result<Self> {
        let observer_buffer: usize = env::var("BROADCAST_BUFFER")
            .unwrap_or_else(|_| "256".to_string())
            .parse()
            .context("Invalid BROADCAST_BUFFER")?;
        if observer_buffer == 0 {
            anyhow::bail!("BROADCAST_BUFFER must be at least 1");
        }

        let session_recheck_secs: u64 = env::var("WS_SESSION_RECHECK_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("Invalid WS_SESSION_RECHECK_SECS")?;
        if session_recheck_secs == 0 {
            anyhow::bail!("WS_SESSION_RECHECK_SECS must be at least 1");
        }

        Ok(Self {
            observer_buffer,
            session_recheck_secs,
        })
    }
}
