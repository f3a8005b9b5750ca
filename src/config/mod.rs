use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::visits::{DEBUG_THRESHOLD, DEFAULT_THRESHOLD};

/// Longest session inactivity expiry accepted (ten years)
pub const MAX_SESSION_EXPIRY_DAYS: u32 = 3650;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub visits: VisitConfig,
    pub session: SessionConfig,
    pub templates: TemplateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where the per-client visit entries live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitStoreKind {
    Cookie,
    Session,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitConfig {
    pub store: VisitStoreKind,
    pub threshold: Duration,
    /// Sign visit cookies with HMAC-SHA256
    pub sign_cookies: bool,
    /// Signing key; a random key is generated when signing without one
    #[serde(skip_serializing)]
    pub cookie_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub expiry_days: u32,
    pub secure: bool,
    /// How often expired sessions are purged from the database
    pub cleanup_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directory of Tera templates on disk
    /// If None, uses the embedded templates
    pub dir: Option<String>,
}

impl Default for VisitConfig {
    fn default() -> Self {
        Self {
            store: VisitStoreKind::Cookie,
            threshold: DEFAULT_THRESHOLD,
            sign_cookies: false,
            cookie_secret: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_days: 14,
            secure: false,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any variable lookup
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = var("DATABASE_URL").unwrap_or_else(|| "sqlite://./rango.db".to_string());
        let max_connections = var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "5".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = var("PORT")
            .unwrap_or_else(|| "8000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let store = match var("VISIT_STORE")
            .unwrap_or_else(|| "cookie".to_string())
            .to_lowercase()
            .as_str()
        {
            "cookie" | "cookies" => VisitStoreKind::Cookie,
            "session" | "sessions" => VisitStoreKind::Session,
            other => {
                tracing::warn!(
                    "Unknown VISIT_STORE '{other}', falling back to 'cookie'. Supported values: cookie, session"
                );
                VisitStoreKind::Cookie
            }
        };

        let debug_visits = var("VISIT_DEBUG").map(|v| parse_flag(&v)).unwrap_or(false);

        let threshold = match var("VISIT_THRESHOLD_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse::<u64>()
                    .context("VISIT_THRESHOLD_SECS must be a number of seconds")?,
            ),
            None if debug_visits => DEBUG_THRESHOLD,
            None => DEFAULT_THRESHOLD,
        };

        let cookie_secret = var("COOKIE_SECRET").filter(|s| !s.is_empty());
        let sign_cookies = cookie_secret.is_some()
            || var("SIGN_COOKIES").map(|v| parse_flag(&v)).unwrap_or(false);

        let expiry_days = var("SESSION_EXPIRY_DAYS")
            .unwrap_or_else(|| "14".to_string())
            .parse::<u32>()
            .context("SESSION_EXPIRY_DAYS must be a number of days")?;
        if !(1..=MAX_SESSION_EXPIRY_DAYS).contains(&expiry_days) {
            anyhow::bail!(
                "SESSION_EXPIRY_DAYS must be between 1 and {}, got {}",
                MAX_SESSION_EXPIRY_DAYS,
                expiry_days
            );
        }
        let secure = var("SESSION_SECURE").map(|v| parse_flag(&v)).unwrap_or(false);
        let cleanup_secs = var("SESSION_CLEANUP_SECS")
            .unwrap_or_else(|| "60".to_string())
            .parse::<u64>()
            .context("SESSION_CLEANUP_SECS must be a number of seconds")?;
        if cleanup_secs == 0 {
            anyhow::bail!("SESSION_CLEANUP_SECS must be at least 1");
        }

        let template_dir = var("TEMPLATE_DIR");

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            visits: VisitConfig {
                store,
                threshold,
                sign_cookies,
                cookie_secret,
            },
            session: SessionConfig {
                expiry_days,
                secure,
                cleanup_interval: Duration::from_secs(cleanup_secs),
            },
            templates: TemplateConfig { dir: template_dir },
        })
    }
}
