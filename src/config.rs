//! Configuration management for keypool
//!
//! Configuration is loaded from environment variables.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::cascade::variants::{ModelCatalog, DEFAULT_MODEL_VARIANTS};
use crate::credentials::model::normalize_provider;
use crate::credentials::policy::HealthConfig;

/// Prefix of the per-provider fallback secret variables
const FALLBACK_PREFIX: &str = "KEYPOOL_FALLBACK_";

/// Credential store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Credential store backend
    pub store_backend: StoreBackend,
    /// Redis connection URL
    pub redis_url: String,

    /// Consecutive failures before cooldown
    pub failure_threshold: u32,
    /// First cooldown duration (in seconds)
    pub cooldown_initial_seconds: u64,
    /// Cooldown cap (in seconds)
    pub cooldown_max_seconds: u64,
    /// Cooldown growth per extra failure
    pub cooldown_multiplier: f64,

    /// Timeout for a single provider call (in seconds)
    pub provider_timeout_seconds: u64,
    /// Timeout for a whole HTTP request (in seconds)
    pub request_timeout_seconds: u64,
    /// Gemini API base URL
    pub gemini_api_url: String,

    /// Ordered model variants per provider
    pub model_catalog: ModelCatalog,
    /// Ordered fallback secrets per provider
    pub fallback_secrets: HashMap<String, Vec<String>>,
    /// Optional JSON file of credentials seeded at startup
    pub credentials_file: Option<String>,

    /// Expose credential admin routes
    pub admin_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let store_backend = match env::var("KEYPOOL_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "redis" => StoreBackend::Redis,
            other => bail!("Invalid KEYPOOL_STORE '{}': expected memory or redis", other),
        };

        let cooldown_multiplier: f64 = env::var("KEYPOOL_COOLDOWN_MULTIPLIER")
            .unwrap_or_else(|_| "2.0".to_string())
            .parse()
            .context("Invalid KEYPOOL_COOLDOWN_MULTIPLIER")?;
        if !(cooldown_multiplier >= 1.0 && cooldown_multiplier.is_finite()) {
            bail!("KEYPOOL_COOLDOWN_MULTIPLIER must be a finite number >= 1.0");
        }

        let failure_threshold: u32 = env::var("KEYPOOL_FAILURE_THRESHOLD")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .context("Invalid KEYPOOL_FAILURE_THRESHOLD")?;
        if failure_threshold == 0 {
            bail!("KEYPOOL_FAILURE_THRESHOLD must be at least 1");
        }

        let model_catalog = ModelCatalog::parse(
            &env::var("KEYPOOL_MODEL_VARIANTS")
                .unwrap_or_else(|_| DEFAULT_MODEL_VARIANTS.to_string()),
        )
        .context("Invalid KEYPOOL_MODEL_VARIANTS")?;

        Ok(Self {
            host: env::var("KEYPOOL_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("KEYPOOL_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid KEYPOOL_PORT")?,

            store_backend,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),

            failure_threshold,
            cooldown_initial_seconds: env::var("KEYPOOL_COOLDOWN_INITIAL_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid KEYPOOL_COOLDOWN_INITIAL_SECONDS")?,
            cooldown_max_seconds: env::var("KEYPOOL_COOLDOWN_MAX_SECONDS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .context("Invalid KEYPOOL_COOLDOWN_MAX_SECONDS")?,
            cooldown_multiplier,

            provider_timeout_seconds: env::var("KEYPOOL_PROVIDER_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid KEYPOOL_PROVIDER_TIMEOUT_SECONDS")?,
            request_timeout_seconds: env::var("KEYPOOL_REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid KEYPOOL_REQUEST_TIMEOUT_SECONDS")?,
            gemini_api_url: env::var("GEMINI_API_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),

            model_catalog,
            fallback_secrets: fallback_secrets_from(env::vars()),
            credentials_file: env::var("KEYPOOL_CREDENTIALS_FILE").ok(),

            admin_enabled: env::var("KEYPOOL_ADMIN_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }

    /// Health policy settings derived from this configuration
    pub fn health_config(&self) -> HealthConfig {
        HealthConfig {
            failure_threshold: self.failure_threshold,
            initial_cooldown: Duration::from_secs(self.cooldown_initial_seconds),
            max_cooldown: Duration::from_secs(
                self.cooldown_max_seconds.max(self.cooldown_initial_seconds),
            ),
            backoff_multiplier: self.cooldown_multiplier,
        }
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Collect `KEYPOOL_FALLBACK_<PROVIDER>=secret1,secret2` variables
fn fallback_secrets_from(
    vars: impl Iterator<Item = (String, String)>,
) -> HashMap<String, Vec<String>> {
    vars.filter_map(|(key, value)| {
        let provider = key.strip_prefix(FALLBACK_PREFIX)?;
        let secrets: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if provider.is_empty() || secrets.is_empty() {
            return None;
        }
        Some((normalize_provider(provider), secrets))
    })
    .collect()
}
