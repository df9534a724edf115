//! Switchyard - dialect-translating chat-completion proxy
//!
//! Callers speak one canonical chat dialect; each request is routed by a
//! path token to a configured upstream provider, translated into that
//! provider's dialect, sent, and translated back (or relayed byte-for-byte
//! when streaming).

pub mod adapters;
pub mod canonical;
pub mod config;
pub mod error;
pub mod middleware;
pub mod orchestrator;
pub mod registry;
pub mod resolver;
pub mod routes;
pub mod store;
pub mod streaming;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

pub use crate::config::Config;
pub use crate::error::{AppError, AppResult};
pub use crate::registry::ProviderRegistry;
pub use crate::resolver::ProviderResolver;

use crate::middleware::{RateLimitConfig, RateLimiter};
use crate::store::{
    seed::seed_default_providers, ProviderStore, RequestLogger, SqliteStore, StoreResult,
};

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ProviderStore>,
    pub logger: Arc<dyn RequestLogger>,
    pub registry: Arc<ProviderRegistry>,
    pub resolver: ProviderResolver,
    pub rate_limiter: RateLimiter,
    pub http_client: reqwest::Client,
    pub start_time: Instant,
}

impl AppState {
    /// Open the SQLite store, seed it if configured, and build the state
    pub async fn new(config: Config) -> Result<Self> {
        let store = Arc::new(
            SqliteStore::open(&config.database_path, config.database_pool_size)
                .await
                .with_context(|| {
                    format!("Failed to open database at {}", config.database_path.display())
                })?,
        );
        info!(path = %config.database_path.display(), "Database opened");

        Self::with_store(config, store).await
    }

    /// Build the state over any store that also records request logs
    pub async fn with_store<S>(config: Config, store: Arc<S>) -> Result<Self>
    where
        S: ProviderStore + RequestLogger + 'static,
    {
        let registry = Arc::new(ProviderRegistry::discover());

        if config.seed_default_providers {
            seed_default_providers(store.as_ref(), &registry)
                .await
                .context("Failed to seed default providers")?;
        }

        let settings = store
            .get_app_settings()
            .await
            .context("Failed to load application settings")?;

        // Per-request timeouts are applied by the adapters.
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .build()?;

        let resolver = ProviderResolver::new(store.clone(), registry.clone(), http_client.clone())
            .with_timeout(Duration::from_secs(settings.request_timeout));

        Ok(Self {
            config,
            logger: store.clone(),
            store,
            registry,
            resolver,
            rate_limiter: RateLimiter::new(),
            http_client,
            start_time: Instant::now(),
        })
    }

    /// Drop idle rate-limit entries using the window currently in settings
    pub async fn prune_rate_limits(&self) -> StoreResult<()> {
        let settings = self.store.get_app_settings().await?;
        self.rate_limiter
            .prune(&RateLimitConfig::from_settings(&settings));
        Ok(())
    }

    /// Send request records somewhere other than the store
    pub fn with_logger(mut self, logger: Arc<dyn RequestLogger>) -> Self {
        self.logger = logger;
        self
    }
}
