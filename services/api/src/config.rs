//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;

use derecho_core::RateLimitPolicy;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Public base URL of the site; verification links point here.
    pub site_url: String,
    pub resend_policy: RateLimitPolicy,
    pub rate_limit_sweep_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let site_url = lookup("SITE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        // --- Resend Throttling ---
        let max_attempts = parse_positive(
            &lookup,
            "RESEND_MAX_ATTEMPTS",
            u64::from(RateLimitPolicy::EMAIL_RESEND.max_attempts),
        )?;
        let max_attempts = u32::try_from(max_attempts).map_err(|e| {
            ConfigError::InvalidValue("RESEND_MAX_ATTEMPTS".to_string(), e.to_string())
        })?;
        let window_secs = parse_positive(
            &lookup,
            "RESEND_WINDOW_SECS",
            RateLimitPolicy::EMAIL_RESEND.window.as_secs(),
        )?;
        let sweep_secs = parse_positive(&lookup, "RATE_LIMIT_SWEEP_SECS", 5 * 60)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            site_url,
            resend_policy: RateLimitPolicy::new(max_attempts, Duration::from_secs(window_secs)),
            rate_limit_sweep_interval: Duration::from_secs(sweep_secs),
        })
    }
}

fn parse_positive<F>(lookup: &F, name: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be greater than zero".to_string(),
        )),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}
