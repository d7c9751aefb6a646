//! Health transitions and selection fairness
//!
//! Drives the selector and recorder against the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use pretty_assertions::assert_eq;

use keypool::credentials::{
    Credential, CredentialSelector, CredentialStatus, CredentialStore, HealthPolicy,
    HealthRecorder,
};

use crate::common::{constants::*, seeded_store};
use crate::mocks::CountingStore;

struct Pool {
    store: Arc<dyn CredentialStore>,
    selector: CredentialSelector,
    recorder: HealthRecorder,
}

async fn pool(credentials: &[(&str, &str)]) -> Pool {
    let store: Arc<dyn CredentialStore> = seeded_store(credentials).await;
    let policy = Arc::new(HealthPolicy::default());
    Pool {
        selector: CredentialSelector::new(store.clone(), policy.clone()),
        recorder: HealthRecorder::new(store.clone(), policy),
        store,
    }
}

#[tokio::test]
async fn test_threshold_failures_exclude_credential_until_cooldown_elapses() {
    let pool = pool(&[("c1", SECRET_1)]).await;

    for _ in 0..2 {
        pool.recorder.record_failure("c1", "HTTP 503: overloaded").await;
    }
    let cred = pool.store.get("c1").await.unwrap().unwrap();
    assert_eq!(cred.status, CredentialStatus::Active);
    assert!(pool.selector.get_best_credential(PROVIDER).await.is_some());

    pool.recorder.record_failure("c1", "HTTP 503: overloaded").await;
    let cred = pool.store.get("c1").await.unwrap().unwrap();
    assert_eq!(cred.status, CredentialStatus::Cooldown);
    assert_eq!(cred.consecutive_failures, 3);
    let until = cred.cooldown_until.expect("cooldown deadline set");

    assert!(pool.selector.get_best_credential(PROVIDER).await.is_none());
    assert!(pool
        .selector
        .get_best_credential_at(PROVIDER, until - Duration::milliseconds(1))
        .await
        .is_none());

    let revived = pool.selector.get_best_credential_at(PROVIDER, until).await;
    assert_eq!(revived.map(|c| c.id), Some("c1".to_string()));
}

#[tokio::test]
async fn test_success_revives_cooldown_and_stays_active() {
    let pool = pool(&[("c1", SECRET_1)]).await;
    for _ in 0..3 {
        pool.recorder.record_failure("c1", "HTTP 429: quota").await;
    }
    assert_eq!(
        pool.store.get("c1").await.unwrap().unwrap().status,
        CredentialStatus::Cooldown
    );

    pool.recorder.record_success("c1", None).await;
    let cred = pool.store.get("c1").await.unwrap().unwrap();
    assert_eq!(cred.status, CredentialStatus::Active);
    assert_eq!(cred.consecutive_failures, 0);
    assert_eq!(cred.cooldown_until, None);

    pool.recorder.record_success("c1", None).await;
    let cred = pool.store.get("c1").await.unwrap().unwrap();
    assert_eq!(cred.status, CredentialStatus::Active);
    assert_eq!(cred.total_successes, 2);
}

#[tokio::test]
async fn test_equal_health_credentials_rotate_round_robin() {
    let ids = ["c1", "c2", "c3"];
    let pool = pool(&[("c1", SECRET_1), ("c2", SECRET_2), ("c3", SECRET_3)]).await;

    let cycles = 30;
    let mut order = Vec::with_capacity(cycles);
    for _ in 0..cycles {
        let cred = pool.selector.get_best_credential(PROVIDER).await.unwrap();
        pool.recorder.record_success(&cred.id, None).await;
        order.push(cred.id);
        // Keep last_used_at strictly increasing between cycles
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }

    // Never-used credentials come first in id order, then strict rotation
    for (i, id) in order.iter().enumerate() {
        assert_eq!(id, ids[i % ids.len()], "cycle {}", i);
    }

    let mut counts: HashMap<String, u64> = HashMap::new();
    for id in order {
        *counts.entry(id).or_default() += 1;
    }
    assert!(counts.values().all(|&n| n == (cycles / ids.len()) as u64));
}

#[tokio::test]
async fn test_failing_credential_is_passed_over_for_healthy_peer() {
    let pool = pool(&[("c1", SECRET_1), ("c2", SECRET_2)]).await;
    pool.recorder.record_failure("c1", "HTTP 500: internal").await;

    for _ in 0..5 {
        let cred = pool.selector.get_best_credential(PROVIDER).await.unwrap();
        assert_eq!(cred.id, "c2");
        pool.recorder.record_success(&cred.id, None).await;
    }
}

#[tokio::test]
async fn test_repeated_failures_extend_cooldown() {
    let pool = pool(&[("c1", SECRET_1)]).await;
    for _ in 0..3 {
        pool.recorder.record_failure("c1", "HTTP 503").await;
    }
    let first = pool.store.get("c1").await.unwrap().unwrap().cooldown_until.unwrap();

    // A caller that selected c1 before the cooldown reports another failure
    pool.recorder.record_failure("c1", "HTTP 503").await;
    let second = pool.store.get("c1").await.unwrap().unwrap().cooldown_until.unwrap();

    assert!(second - first >= Duration::seconds(25));
    assert!(second > Utc::now() + Duration::seconds(55));
}

#[tokio::test]
async fn test_concurrent_failures_reach_exact_counts() {
    let pool = Arc::new(pool(&[("c1", SECRET_1)]).await);

    let handles = (0..40).map(|_| {
        let pool = pool.clone();
        tokio::spawn(async move {
            pool.recorder.record_failure("c1", "HTTP 503").await;
        })
    });
    for result in join_all(handles).await {
        result.unwrap();
    }

    let cred = pool.store.get("c1").await.unwrap().unwrap();
    assert_eq!(cred.consecutive_failures, 40);
    assert_eq!(cred.total_failures, 40);
    assert_eq!(cred.status, CredentialStatus::Cooldown);
}

#[tokio::test]
async fn test_success_between_failure_and_cooldown_leaves_credential_active() {
    let store = Arc::new(CountingStore::new().success_after_failure(3));
    store
        .insert(Credential::with_id("c1", PROVIDER, SECRET_1))
        .await
        .unwrap();
    let store: Arc<dyn CredentialStore> = store;
    let recorder = HealthRecorder::new(store.clone(), Arc::new(HealthPolicy::default()));

    for _ in 0..3 {
        recorder.record_failure("c1", "HTTP 503").await;
    }

    let cred = store.get("c1").await.unwrap().unwrap();
    assert_eq!(cred.status, CredentialStatus::Active);
    assert_eq!(cred.consecutive_failures, 0);
    assert_eq!(cred.cooldown_until, None);
    assert_eq!(cred.total_successes, 1);
}
