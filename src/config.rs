//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which store backs the users table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

/// Per-client rate limiter settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterConfig {
    /// Sustained requests per second per client
    pub rps: f64,
    /// Requests a client may make in a burst
    pub burst: u32,
    pub enabled: bool,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            rps: 2.0,
            burst: 4,
            enabled: true,
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Environment (development|staging|production)
    pub env: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Collection holding users
    pub users_collection: String,
    pub store_backend: StoreBackend,
    /// Timeout for single-item store operations
    pub store_timeout: Duration,
    /// Timeout for table lifecycle operations
    pub table_timeout: Duration,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    pub limiter: LimiterConfig,
}

impl Config {
    /// Offline config for tests.
    pub fn test_default() -> Self {
        Self {
            port: 4000,
            env: "development".to_string(),
            gcp_project_id: "test-project".to_string(),
            users_collection: "users".to_string(),
            store_backend: StoreBackend::Memory,
            store_timeout: Duration::from_secs(3),
            table_timeout: Duration::from_secs(300),
            frontend_url: "http://localhost:5173".to_string(),
            limiter: LimiterConfig {
                enabled: false,
                ..Default::default()
            },
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        if !crate::validator::permitted_value(
            &app_env.as_str(),
            &["development", "staging", "production"],
        ) {
            return Err(ConfigError::Invalid("APP_ENV", app_env));
        }

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .as_str()
        {
            "firestore" => StoreBackend::Firestore,
            "memory" => StoreBackend::Memory,
            other => return Err(ConfigError::Invalid("STORE_BACKEND", other.to_string())),
        };

        let defaults = LimiterConfig::default();
        let limiter = LimiterConfig {
            rps: parse_or("LIMITER_RPS", defaults.rps)?,
            burst: parse_or("LIMITER_BURST", defaults.burst)?,
            enabled: parse_or("LIMITER_ENABLED", defaults.enabled)?,
        };
        if limiter.enabled && !(limiter.rps > 0.0 && limiter.rps.is_finite()) {
            return Err(ConfigError::Invalid("LIMITER_RPS", limiter.rps.to_string()));
        }
        if limiter.enabled && limiter.burst == 0 {
            return Err(ConfigError::Invalid("LIMITER_BURST", "0".to_string()));
        }

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .unwrap_or(4000),
            env: app_env,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            users_collection: env::var("USERS_COLLECTION")
                .unwrap_or_else(|_| crate::db::collections::USERS.to_string()),
            store_backend,
            store_timeout: Duration::from_millis(parse_or("STORE_TIMEOUT_MS", 3000)?),
            table_timeout: Duration::from_secs(parse_or("TABLE_TIMEOUT_SECS", 300)?),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            limiter,
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    Invalid(&'static str, String),
}
