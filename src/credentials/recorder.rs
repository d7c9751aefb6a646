//! Usage and failure bookkeeping
//!
//! Records the result of every provider call against the credential that
//! made it. Recording never fails the caller: storage errors are logged and
//! swallowed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::policy::{is_quota_error, HealthPolicy};
use super::store::{CredentialStore, StoreResult};
use crate::routes::metrics;

/// Applies usage and failure outcomes to the credential store
pub struct HealthRecorder {
    store: Arc<dyn CredentialStore>,
    policy: Arc<HealthPolicy>,
}

impl HealthRecorder {
    pub fn new(store: Arc<dyn CredentialStore>, policy: Arc<HealthPolicy>) -> Self {
        Self { store, policy }
    }

    /// Record a successful call.
    ///
    /// Resets consecutive failures and revives a cooling-down credential.
    pub async fn record_success(&self, credential_id: &str, note: Option<&str>) {
        match self.store.apply_success(credential_id, Utc::now()).await {
            Ok(()) => debug!(
                credential_id = %credential_id,
                note = note.unwrap_or(""),
                "Recorded credential success"
            ),
            Err(e) => error!(
                credential_id = %credential_id,
                error = %e,
                "Failed to record credential success"
            ),
        }
    }

    /// Record a failed call, entering cooldown once the threshold is reached.
    pub async fn record_failure(&self, credential_id: &str, reason: &str) {
        let now = Utc::now();
        let quota = is_quota_error(None, reason);

        let counters = match self.store.apply_failure(credential_id, reason, now).await {
            Ok(counters) => counters,
            Err(e) => {
                error!(
                    credential_id = %credential_id,
                    error = %e,
                    "Failed to record credential failure"
                );
                return;
            }
        };

        debug!(
            credential_id = %credential_id,
            consecutive_failures = counters.consecutive_failures,
            total_failures = counters.total_failures,
            quota,
            reason = %reason,
            "Recorded credential failure"
        );

        if !self.policy.should_cool_down(counters.consecutive_failures) {
            return;
        }

        let cooldown = self.policy.cooldown_duration(counters.consecutive_failures);
        let until = self.policy.cooldown_until(counters.consecutive_failures, now);
        match self
            .store
            .enter_cooldown(credential_id, until, counters.consecutive_failures)
            .await
        {
            Ok(true) => {
                warn!(
                    credential_id = %credential_id,
                    consecutive_failures = counters.consecutive_failures,
                    cooldown_secs = cooldown.as_secs(),
                    quota,
                    "Credential entering cooldown"
                );
                metrics::record_cooldown();
            }
            Ok(false) => debug!(
                credential_id = %credential_id,
                "Credential changed since the failure was recorded, cooldown not applied"
            ),
            Err(e) => error!(
                credential_id = %credential_id,
                error = %e,
                "Failed to put credential into cooldown"
            ),
        }
    }

    /// Permanently disable a credential.
    ///
    /// `Ok(false)` means another caller disabled it first; only `Err` means
    /// the store could not be updated.
    pub async fn disable(&self, credential_id: &str, reason: &str) -> StoreResult<bool> {
        let result = self.store.disable(credential_id, reason).await;
        match &result {
            Ok(true) => info!(
                credential_id = %credential_id,
                reason = %reason,
                "Credential disabled"
            ),
            Ok(false) => debug!(credential_id = %credential_id, "Credential already disabled"),
            Err(e) => error!(
                credential_id = %credential_id,
                error = %e,
                "Failed to disable credential"
            ),
        }
        result
    }
}
