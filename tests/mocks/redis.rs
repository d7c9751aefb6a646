//! Redis test helpers
//!
//! Tests use a real Redis if one is reachable and skip otherwise. Each
//! connection gets a unique key prefix, and `cleanup` removes everything
//! written under it.
//!
//! # Example
//!
//! ```rust,ignore
//! let Some(redis) = TestRedis::connect().await else {
//!     eprintln!("Skipping test: Redis not available");
//!     return;
//! };
//! let store = RedisCredentialStore::with_prefix(redis.conn(), redis.namespace());
//! // ...
//! redis.cleanup().await.unwrap();
//! ```

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use redis::AsyncCommands;

/// Default Redis URL for testing
pub const TEST_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Test key prefix to avoid collisions with real data
pub const TEST_KEY_PREFIX: &str = "keypool:test:";

/// Counter for generating unique test namespaces
static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct TestRedis {
    conn: redis::aio::ConnectionManager,
    namespace: String,
}

impl TestRedis {
    /// Connect to the default test Redis, or `None` if it is unavailable
    pub async fn connect() -> Option<Self> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| TEST_REDIS_URL.to_string());
        Self::connect_with_url(&url).await
    }

    pub async fn connect_with_url(url: &str) -> Option<Self> {
        let client = redis::Client::open(url).ok()?;
        let conn = client.get_connection_manager().await.ok()?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis();
        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let namespace = format!("{}{}_{}", TEST_KEY_PREFIX, timestamp, counter);

        Some(Self { conn, namespace })
    }

    pub fn conn(&self) -> redis::aio::ConnectionManager {
        self.conn.clone()
    }

    /// Key prefix for stores created in this test
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Delete every key under this test's namespace
    pub async fn cleanup(&self) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn.keys(format!("{}:*", self.namespace)).await?;
        if !keys.is_empty() {
            conn.del::<_, ()>(keys).await?;
        }
        Ok(())
    }
}
