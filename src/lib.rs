//! Keypool - credential pool and adaptive model cascade
//!
//! This library manages a pool of rate-limited provider credentials, tracks
//! their health across concurrent callers and cascades requests across
//! provider model variants.

pub mod cascade;
pub mod config;
pub mod credentials;
pub mod error;
pub mod pool;
pub mod provider;
pub mod routes;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

pub use crate::cascade::{ErrorKind, ModelCascadeOrchestrator, ModelCatalog, RequestOutcome};
pub use crate::config::{Config, StoreBackend};
pub use crate::credentials::{
    CredentialStore, EnvFallbackResolver, HealthPolicy, InMemoryCredentialStore,
    RedisCredentialStore,
};
pub use crate::pool::CredentialPool;
pub use crate::provider::{GeminiClient, ProviderClient, ProviderError};

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    pub start_time: Instant,
    /// Credential pool and cascade
    pub pool: Arc<CredentialPool>,
}

impl AppState {
    /// Create a new application state
    pub async fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn CredentialStore> = match config.store_backend {
            StoreBackend::Memory => Arc::new(InMemoryCredentialStore::new()),
            StoreBackend::Redis => {
                let redis_client = redis::Client::open(config.redis_url.as_str())?;
                let redis = redis::aio::ConnectionManager::new(redis_client)
                    .await
                    .context("Failed to connect to Redis")?;
                Arc::new(RedisCredentialStore::new(redis))
            }
        };
        info!(backend = store.backend(), "Credential store initialized");

        // HTTP client with connection pooling; per-attempt timeouts are
        // enforced by the cascade
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .build()?;
        let client: Arc<dyn ProviderClient> = Arc::new(GeminiClient::new(http_client, &config));

        let state = Self::from_parts(config, store, client);

        if let Some(path) = &state.config.credentials_file {
            state.pool.seed_from_file(path).await?;
        }

        Ok(state)
    }

    /// Assemble state from an explicit store and provider client
    pub fn from_parts(
        config: Config,
        store: Arc<dyn CredentialStore>,
        client: Arc<dyn ProviderClient>,
    ) -> Self {
        let pool = Arc::new(CredentialPool::new(
            store,
            HealthPolicy::new(config.health_config()),
            EnvFallbackResolver::new(config.fallback_secrets.clone()),
            config.model_catalog.clone(),
            client,
            config.provider_timeout(),
        ));

        Self {
            config,
            start_time: Instant::now(),
            pool,
        }
    }
}
