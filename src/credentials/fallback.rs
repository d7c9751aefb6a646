//! Environment fallback credentials
//!
//! Static, ordered secrets per provider used when the store has nothing
//! eligible. They are always considered Active and are never health-tracked.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::model::{normalize_provider, SelectedCredential};
use super::policy::{fingerprint, validate_secret};

/// Resolves untracked fallback credentials
#[derive(Debug, Clone, Default)]
pub struct EnvFallbackResolver {
    secrets: HashMap<String, Vec<String>>,
}

impl EnvFallbackResolver {
    pub fn new(secrets: HashMap<String, Vec<String>>) -> Self {
        let secrets = secrets
            .into_iter()
            .map(|(provider, list)| (normalize_provider(&provider), list))
            .collect();
        Self { secrets }
    }

    /// First configured secret for `provider` that passes format validation
    pub fn resolve(&self, provider: &str) -> Option<SelectedCredential> {
        let list = self.secrets.get(provider)?;
        for secret in list {
            match validate_secret(secret) {
                Ok(()) => {
                    debug!(
                        provider = %provider,
                        fingerprint = %fingerprint(secret),
                        "Using environment fallback credential"
                    );
                    return Some(SelectedCredential::untracked(secret));
                }
                Err(e) => warn!(
                    provider = %provider,
                    fingerprint = %fingerprint(secret),
                    error = %e,
                    "Skipping malformed fallback credential"
                ),
            }
        }
        None
    }

    /// Number of fallback secrets configured for `provider`
    pub fn configured(&self, provider: &str) -> usize {
        self.secrets.get(provider).map(Vec::len).unwrap_or(0)
    }
}
