//! Configuration management for Switchyard
//!
//! Process-level configuration is loaded from environment variables.
//! Runtime behavior (rate limiting, logging, streaming, timeouts) lives in
//! the store's settings row instead.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::middleware::ApiKeys;
use crate::store::pool::DEFAULT_POOL_SIZE;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Overrides the stored `server_host` when set
    pub host: Option<String>,
    /// Overrides the stored `server_port` when set
    pub port: Option<u16>,

    /// SQLite database file
    pub database_path: PathBuf,
    pub database_pool_size: usize,

    /// Insert the built-in providers on startup when missing
    pub seed_default_providers: bool,

    /// Inbound keys; empty disables inbound authentication
    pub api_keys: ApiKeys,

    /// Key rate limits on `x-forwarded-for` instead of the peer address.
    /// Only safe behind a reverse proxy that overwrites the header.
    pub trust_forwarded_for: bool,

    /// Emit logs as JSON
    pub json_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            database_path: PathBuf::from("switchyard.db"),
            database_pool_size: DEFAULT_POOL_SIZE,
            seed_default_providers: true,
            api_keys: ApiKeys::default(),
            trust_forwarded_for: false,
            json_logs: false,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            host: lookup("SWITCHYARD_HOST").filter(|h| !h.trim().is_empty()),
            port: lookup("SWITCHYARD_PORT")
                .map(|p| p.trim().parse())
                .transpose()
                .context("Invalid SWITCHYARD_PORT")?,

            database_path: lookup("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            database_pool_size: lookup("DATABASE_POOL_SIZE")
                .map(|s| s.trim().parse())
                .transpose()
                .context("Invalid DATABASE_POOL_SIZE")?
                .unwrap_or(defaults.database_pool_size),

            seed_default_providers: lookup("SEED_DEFAULT_PROVIDERS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.seed_default_providers),

            api_keys: lookup("PROXY_API_KEYS")
                .map(|raw| ApiKeys::parse(&raw))
                .unwrap_or_default(),

            trust_forwarded_for: lookup("TRUST_FORWARDED_FOR")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.trust_forwarded_for),

            json_logs: lookup("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}
