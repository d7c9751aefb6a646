//! Call-counting credential store
//!
//! Wraps the in-memory store and counts health mutations so tests can assert
//! that bookkeeping did or did not happen. It can also replay races that are
//! hard to hit with real concurrency: a success landing right after a given
//! failure, or one stale candidate listing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use keypool::credentials::{
    Credential, CredentialStore, FailureCounters, InMemoryCredentialStore, StoreResult,
};

#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryCredentialStore,
    successes: AtomicUsize,
    failures: AtomicUsize,
    success_after_failure: Mutex<Option<usize>>,
    stale_candidates: Mutex<Option<Vec<Credential>>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a success straight after the `n`th `apply_failure` call returns
    /// its counters, before the caller can act on them
    pub fn success_after_failure(self, n: usize) -> Self {
        *self.success_after_failure.lock().unwrap() = Some(n);
        self
    }

    /// Serve `snapshot` from the next `list_candidates` call only
    pub fn serve_stale_candidates(&self, snapshot: Vec<Credential>) {
        *self.stale_candidates.lock().unwrap() = Some(snapshot);
    }

    /// Number of `apply_success` calls
    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    /// Number of `apply_failure` calls
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    fn backend(&self) -> &'static str {
        "counting"
    }

    async fn insert(&self, credential: Credential) -> StoreResult<()> {
        self.inner.insert(credential).await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Credential>> {
        self.inner.get(id).await
    }

    async fn list_by_provider(&self, provider: &str) -> StoreResult<Vec<Credential>> {
        self.inner.list_by_provider(provider).await
    }

    async fn list_candidates(&self, provider: &str) -> StoreResult<Vec<Credential>> {
        let stale = self.stale_candidates.lock().unwrap().take();
        match stale {
            Some(snapshot) => Ok(snapshot),
            None => self.inner.list_candidates(provider).await,
        }
    }

    async fn providers(&self) -> StoreResult<Vec<String>> {
        self.inner.providers().await
    }

    async fn apply_success(&self, id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        self.successes.fetch_add(1, Ordering::SeqCst);
        self.inner.apply_success(id, now).await
    }

    async fn apply_failure(
        &self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<FailureCounters> {
        let call = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        let counters = self.inner.apply_failure(id, reason, now).await?;
        let interleave = *self.success_after_failure.lock().unwrap() == Some(call);
        if interleave {
            self.inner.apply_success(id, Utc::now()).await?;
        }
        Ok(counters)
    }

    async fn enter_cooldown(
        &self,
        id: &str,
        until: DateTime<Utc>,
        expected_failures: u32,
    ) -> StoreResult<bool> {
        self.inner.enter_cooldown(id, until, expected_failures).await
    }

    async fn disable(&self, id: &str, reason: &str) -> StoreResult<bool> {
        self.inner.disable(id, reason).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}
