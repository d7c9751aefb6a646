//! Credential selection
//!
//! Picks the healthiest, least recently used credential of a provider.
//! Selection is a plain read: nothing is reserved, so concurrent callers may
//! receive the same credential.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::model::Credential;
use super::policy::HealthPolicy;
use super::store::CredentialStore;

/// Health-aware credential selector
pub struct CredentialSelector {
    store: Arc<dyn CredentialStore>,
    policy: Arc<HealthPolicy>,
}

impl CredentialSelector {
    pub fn new(store: Arc<dyn CredentialStore>, policy: Arc<HealthPolicy>) -> Self {
        Self { store, policy }
    }

    /// Best eligible credential for `provider`, or `None`.
    ///
    /// Store errors are logged and reported as "no credential".
    pub async fn get_best_credential(&self, provider: &str) -> Option<Credential> {
        self.get_best_credential_at(provider, Utc::now()).await
    }

    /// Same as `get_best_credential` with an explicit clock reading
    pub async fn get_best_credential_at(
        &self,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Option<Credential> {
        let candidates = match self.store.list_candidates(provider).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(
                    provider = %provider,
                    error = %e,
                    "Failed to load credentials for selection"
                );
                return None;
            }
        };

        let total = candidates.len();
        let selected = candidates
            .into_iter()
            .filter(|c| self.policy.is_eligible(c, now))
            .min_by(HealthPolicy::selection_order);

        match &selected {
            Some(cred) => debug!(
                provider = %provider,
                credential_id = %cred.id,
                consecutive_failures = cred.consecutive_failures,
                candidates = total,
                "Selected credential"
            ),
            None => debug!(
                provider = %provider,
                candidates = total,
                "No eligible credential"
            ),
        }

        selected
    }
}
