//! Credential storage abstraction
//!
//! Every health mutation is a single storage-layer operation so concurrent
//! recordings never lose updates. Reads used for selection may be slightly
//! stale.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::model::{Credential, FailureCounters};

/// Storage-level errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Credential not found: {0}")]
    NotFound(String),

    #[error("Corrupt credential record {id}: {detail}")]
    Corrupt { id: String, detail: String },

    #[error("Credential store lock poisoned")]
    Poisoned,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Result type alias for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted collection of provider credentials
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Backend name for logging and health checks
    fn backend(&self) -> &'static str;

    /// Insert a new credential (provisioning)
    async fn insert(&self, credential: Credential) -> StoreResult<()>;

    /// Fetch a credential by id
    async fn get(&self, id: &str) -> StoreResult<Option<Credential>>;

    /// All credentials of a provider, any status
    async fn list_by_provider(&self, provider: &str) -> StoreResult<Vec<Credential>>;

    /// Credentials of a provider that are not Disabled
    async fn list_candidates(&self, provider: &str) -> StoreResult<Vec<Credential>>;

    /// Providers that have at least one credential
    async fn providers(&self) -> StoreResult<Vec<String>>;

    /// Success bookkeeping: reset consecutive failures, bump total successes,
    /// stamp `last_used_at` and revive a cooldown. Disabled stays disabled.
    async fn apply_success(&self, id: &str, now: DateTime<Utc>) -> StoreResult<()>;

    /// Failure bookkeeping: bump both failure counters, store the reason and
    /// stamp `last_used_at`. Returns the counters after the increment.
    async fn apply_failure(
        &self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<FailureCounters>;

    /// Compare-and-swap into Cooldown.
    ///
    /// Applies only while the stored consecutive-failure count still equals
    /// `expected_failures` and the credential is not Disabled; returns false
    /// otherwise. A success or a newer failure landing after the caller's
    /// `apply_failure` therefore wins.
    async fn enter_cooldown(
        &self,
        id: &str,
        until: DateTime<Utc>,
        expected_failures: u32,
    ) -> StoreResult<bool>;

    /// Move to the terminal Disabled state. Returns false if already disabled.
    async fn disable(&self, id: &str, reason: &str) -> StoreResult<bool>;

    /// Connectivity check
    async fn ping(&self) -> StoreResult<()>;
}
