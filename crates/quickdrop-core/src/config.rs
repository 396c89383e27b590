//! Configuration module
//!
//! Settings are read from the environment (after loading an optional `.env` file).
//! The binary may override the listen port, upload limit and storage path from the
//! command line.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_HTTP_CONCURRENCY_LIMIT, DEFAULT_ITEM_TTL_SECS, DEFAULT_MAX_UPLOAD_MB, DEFAULT_PORT,
    DEFAULT_REAPER_INTERVAL_SECS, DEFAULT_STORAGE_PATH, DEFAULT_UPLOAD_TIMEOUT_SECS,
};

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub max_upload_mb: u64,
    pub storage_path: PathBuf,
    pub item_ttl_secs: u64,
    pub reaper_interval_secs: u64,
    pub upload_timeout_secs: u64,
    pub http_concurrency_limit: usize,
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            item_ttl_secs: DEFAULT_ITEM_TTL_SECS,
            reaper_interval_secs: DEFAULT_REAPER_INTERVAL_SECS,
            upload_timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
            http_concurrency_limit: DEFAULT_HTTP_CONCURRENCY_LIMIT,
            environment: "development".to_string(),
        }
    }
}

fn env_number<T: FromStr>(name: &str, default: T) -> Result<T, anyhow::Error> {
    parse_number(name, env::var(name).ok(), default)
}

/// Parse a numeric setting. Unset means `default`; anything unparsable is an error.
fn parse_number<T: FromStr>(
    name: &str,
    value: Option<String>,
    default: T,
) -> Result<T, anyhow::Error> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let config = Config {
            server_port: env_number("PORT", DEFAULT_PORT)?,
            max_upload_mb: env_number("MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)?,
            storage_path: env::var("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_PATH)),
            item_ttl_secs: env_number("ITEM_TTL_SECS", DEFAULT_ITEM_TTL_SECS)?,
            reaper_interval_secs: env_number("REAPER_INTERVAL_SECS", DEFAULT_REAPER_INTERVAL_SECS)?,
            upload_timeout_secs: env_number("UPLOAD_TIMEOUT_SECS", DEFAULT_UPLOAD_TIMEOUT_SECS)?,
            http_concurrency_limit: env_number(
                "HTTP_CONCURRENCY_LIMIT",
                DEFAULT_HTTP_CONCURRENCY_LIMIT,
            )?,
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.item_ttl_secs == 0 {
            return Err(anyhow::anyhow!("ITEM_TTL_SECS must be greater than zero"));
        }
        if self.reaper_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "REAPER_INTERVAL_SECS must be greater than zero"
            ));
        }
        if self.upload_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "UPLOAD_TIMEOUT_SECS must be greater than zero"
            ));
        }
        if self.http_concurrency_limit == 0 {
            return Err(anyhow::anyhow!(
                "HTTP_CONCURRENCY_LIMIT must be greater than zero"
            ));
        }
        if self.max_upload_mb == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_MB must be greater than zero"));
        }
        if self.storage_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("STORAGE_PATH must not be empty"));
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn item_ttl(&self) -> Duration {
        Duration::from_secs(self.item_ttl_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize).saturating_mul(1024 * 1024)
    }
}
