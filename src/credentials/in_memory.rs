//! In-memory credential store
//!
//! Single-process backend used in development and tests. Each mutation runs
//! inside one write-lock critical section, which makes it atomic with respect
//! to every other caller of the same store.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{Credential, CredentialStatus, FailureCounters};
use super::store::{CredentialStore, StoreError, StoreResult};

/// In-memory credential store
///
/// # Thread Safety
///
/// Uses RwLock for interior mutability, allowing concurrent reads.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    data: RwLock<HashMap<String, Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, Credential>>> {
        self.data.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, Credential>>> {
        self.data.write().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, credential: Credential) -> StoreResult<()> {
        let mut data = self.write()?;
        data.insert(credential.id.clone(), credential);
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Credential>> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn list_by_provider(&self, provider: &str) -> StoreResult<Vec<Credential>> {
        let data = self.read()?;
        Ok(data
            .values()
            .filter(|c| c.provider == provider)
            .cloned()
            .collect())
    }

    async fn list_candidates(&self, provider: &str) -> StoreResult<Vec<Credential>> {
        let data = self.read()?;
        Ok(data
            .values()
            .filter(|c| c.provider == provider && c.status != CredentialStatus::Disabled)
            .cloned()
            .collect())
    }

    async fn providers(&self) -> StoreResult<Vec<String>> {
        let data = self.read()?;
        let providers: BTreeSet<String> = data.values().map(|c| c.provider.clone()).collect();
        Ok(providers.into_iter().collect())
    }

    async fn apply_success(&self, id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let mut data = self.write()?;
        let cred = data
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        cred.consecutive_failures = 0;
        cred.total_successes += 1;
        cred.last_used_at = Some(now);
        if cred.status == CredentialStatus::Cooldown {
            cred.status = CredentialStatus::Active;
            cred.cooldown_until = None;
        }
        Ok(())
    }

    async fn apply_failure(
        &self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<FailureCounters> {
        let mut data = self.write()?;
        let cred = data
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        cred.consecutive_failures = cred.consecutive_failures.saturating_add(1);
        cred.total_failures += 1;
        cred.last_failure_reason = Some(reason.to_string());
        cred.last_used_at = Some(now);

        Ok(FailureCounters {
            consecutive_failures: cred.consecutive_failures,
            total_failures: cred.total_failures,
        })
    }

    async fn enter_cooldown(
        &self,
        id: &str,
        until: DateTime<Utc>,
        expected_failures: u32,
    ) -> StoreResult<bool> {
        let mut data = self.write()?;
        let cred = data
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if cred.status == CredentialStatus::Disabled
            || cred.consecutive_failures != expected_failures
        {
            return Ok(false);
        }
        cred.status = CredentialStatus::Cooldown;
        cred.cooldown_until = Some(until);
        Ok(true)
    }

    async fn disable(&self, id: &str, reason: &str) -> StoreResult<bool> {
        let mut data = self.write()?;
        let cred = data
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if cred.status == CredentialStatus::Disabled {
            return Ok(false);
        }
        cred.status = CredentialStatus::Disabled;
        cred.cooldown_until = None;
        cred.last_failure_reason = Some(reason.to_string());
        Ok(true)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }
}
