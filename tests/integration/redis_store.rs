//! Redis credential store against a live server
//!
//! Every test skips when Redis is not reachable.

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use pretty_assertions::assert_eq;

use keypool::credentials::{
    Credential, CredentialSelector, CredentialStatus, CredentialStore, HealthPolicy,
    HealthRecorder,
};
use keypool::RedisCredentialStore;

use crate::common::constants::*;
use crate::mocks::TestRedis;

async fn connect() -> Option<(TestRedis, Arc<RedisCredentialStore>)> {
    let redis = TestRedis::connect().await?;
    let store = Arc::new(RedisCredentialStore::with_prefix(
        redis.conn(),
        redis.namespace(),
    ));
    Some((redis, store))
}

macro_rules! redis_or_skip {
    () => {
        match connect().await {
            Some(pair) => pair,
            None => {
                eprintln!("Skipping test: Redis not available");
                return;
            }
        }
    };
}

#[tokio::test]
async fn test_insert_get_and_list() {
    let (redis, store) = redis_or_skip!();

    let mut cred = Credential::with_id("c1", PROVIDER, SECRET_1);
    cred.label = Some("primary".to_string());
    store.insert(cred.clone()).await.unwrap();
    store
        .insert(Credential::with_id("c2", PROVIDER, SECRET_2))
        .await
        .unwrap();

    let loaded = store.get("c1").await.unwrap().unwrap();
    assert_eq!(loaded.secret, SECRET_1);
    assert_eq!(loaded.label.as_deref(), Some("primary"));
    assert_eq!(loaded.status, CredentialStatus::Active);
    assert_eq!(
        loaded.created_at.timestamp_millis(),
        cred.created_at.timestamp_millis()
    );

    assert_eq!(store.list_by_provider(PROVIDER).await.unwrap().len(), 2);
    assert_eq!(store.providers().await.unwrap(), vec![PROVIDER.to_string()]);
    assert!(store.get("missing").await.unwrap().is_none());
    store.ping().await.unwrap();

    redis.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_failure_cooldown_and_success_move_indexes() {
    let (redis, store) = redis_or_skip!();
    store
        .insert(Credential::with_id("c1", PROVIDER, SECRET_1))
        .await
        .unwrap();

    let now = Utc::now();
    let counters = store.apply_failure("c1", "HTTP 429", now).await.unwrap();
    assert_eq!(counters.consecutive_failures, 1);
    assert_eq!(counters.total_failures, 1);

    assert!(!store
        .enter_cooldown("c1", now + Duration::seconds(30), 2)
        .await
        .unwrap());
    assert!(store
        .enter_cooldown("c1", now + Duration::seconds(30), counters.consecutive_failures)
        .await
        .unwrap());
    let cred = store.get("c1").await.unwrap().unwrap();
    assert_eq!(cred.status, CredentialStatus::Cooldown);
    assert_eq!(cred.last_failure_reason.as_deref(), Some("HTTP 429"));
    assert_eq!(store.list_candidates(PROVIDER).await.unwrap().len(), 1);

    store.apply_success("c1", Utc::now()).await.unwrap();
    let cred = store.get("c1").await.unwrap().unwrap();
    assert_eq!(cred.status, CredentialStatus::Active);
    assert_eq!(cred.consecutive_failures, 0);
    assert_eq!(cred.cooldown_until, None);
    assert_eq!(cred.total_successes, 1);

    redis.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_disable_is_terminal() {
    let (redis, store) = redis_or_skip!();
    store
        .insert(Credential::with_id("c1", PROVIDER, SECRET_1))
        .await
        .unwrap();

    assert!(store.disable("c1", "leaked").await.unwrap());
    assert!(!store.disable("c1", "leaked").await.unwrap());
    assert!(!store
        .enter_cooldown("c1", Utc::now() + Duration::seconds(30), 0)
        .await
        .unwrap());

    store.apply_success("c1", Utc::now()).await.unwrap();
    let cred = store.get("c1").await.unwrap().unwrap();
    assert_eq!(cred.status, CredentialStatus::Disabled);
    assert!(store.list_candidates(PROVIDER).await.unwrap().is_empty());

    redis.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_cooldown_skipped_after_interleaved_success() {
    let (redis, store) = redis_or_skip!();
    store
        .insert(Credential::with_id("c1", PROVIDER, SECRET_1))
        .await
        .unwrap();

    let now = Utc::now();
    let mut counters = store.apply_failure("c1", "HTTP 503", now).await.unwrap();
    for _ in 0..2 {
        counters = store.apply_failure("c1", "HTTP 503", now).await.unwrap();
    }
    store.apply_success("c1", now).await.unwrap();

    assert!(!store
        .enter_cooldown("c1", now + Duration::seconds(30), counters.consecutive_failures)
        .await
        .unwrap());
    let cred = store.get("c1").await.unwrap().unwrap();
    assert_eq!(cred.status, CredentialStatus::Active);
    assert_eq!(store.list_candidates(PROVIDER).await.unwrap().len(), 1);

    redis.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_reinsert_moves_index_entry() {
    let (redis, store) = redis_or_skip!();
    store
        .insert(Credential::with_id("c1", PROVIDER, SECRET_1))
        .await
        .unwrap();

    let mut replaced = Credential::with_id("c1", PROVIDER, SECRET_2);
    replaced.status = CredentialStatus::Disabled;
    store.insert(replaced).await.unwrap();

    assert!(store.list_candidates(PROVIDER).await.unwrap().is_empty());
    let all = store.list_by_provider(PROVIDER).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, CredentialStatus::Disabled);

    redis.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let (redis, store) = redis_or_skip!();

    assert!(store.apply_success("nope", Utc::now()).await.is_err());
    assert!(store.apply_failure("nope", "x", Utc::now()).await.is_err());
    assert!(store.disable("nope", "x").await.is_err());

    redis.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_failures_are_atomic_and_cool_down() {
    let (redis, store) = redis_or_skip!();
    store
        .insert(Credential::with_id("c1", PROVIDER, SECRET_1))
        .await
        .unwrap();
    let store: Arc<dyn CredentialStore> = store;
    let policy = Arc::new(HealthPolicy::default());
    let recorder = Arc::new(HealthRecorder::new(store.clone(), policy.clone()));

    let handles = (0..25).map(|_| {
        let recorder = recorder.clone();
        tokio::spawn(async move { recorder.record_failure("c1", "HTTP 503").await })
    });
    for result in join_all(handles).await {
        result.unwrap();
    }

    let cred = store.get("c1").await.unwrap().unwrap();
    assert_eq!(cred.consecutive_failures, 25);
    assert_eq!(cred.total_failures, 25);
    assert_eq!(cred.status, CredentialStatus::Cooldown);

    let selector = CredentialSelector::new(store.clone(), policy);
    assert!(selector.get_best_credential(PROVIDER).await.is_none());

    redis.cleanup().await.unwrap();
}
