//! Redis credential store
//!
//! Each credential is a hash; a set per `(provider, status)` indexes them for
//! selection. Health mutations run as Lua scripts so counter increments and
//! status/index moves are atomic across every keypool instance sharing the
//! same Redis.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Script};
use tracing::warn;

use super::model::{Credential, CredentialStatus, FailureCounters};
use super::store::{CredentialStore, StoreError, StoreResult};

const SUCCESS_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then return -1 end
redis.call('HSET', KEYS[1], 'consecutive_failures', 0, 'last_used_at', ARGV[1])
redis.call('HINCRBY', KEYS[1], 'total_successes', 1)
if redis.call('HGET', KEYS[1], 'status') == 'cooldown' then
  local provider = redis.call('HGET', KEYS[1], 'provider')
  local id = redis.call('HGET', KEYS[1], 'id')
  redis.call('HSET', KEYS[1], 'status', 'active')
  redis.call('HDEL', KEYS[1], 'cooldown_until')
  redis.call('SMOVE', ARGV[2] .. provider .. ':cooldown', ARGV[2] .. provider .. ':active', id)
end
return 1
";

const FAILURE_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then return {} end
local consecutive = redis.call('HINCRBY', KEYS[1], 'consecutive_failures', 1)
local total = redis.call('HINCRBY', KEYS[1], 'total_failures', 1)
redis.call('HSET', KEYS[1], 'last_failure_reason', ARGV[1], 'last_used_at', ARGV[2])
return {consecutive, total}
";

const COOLDOWN_SCRIPT: &str = r"
local status = redis.call('HGET', KEYS[1], 'status')
if not status then return -1 end
if status == 'disabled' then return 0 end
local consecutive = tonumber(redis.call('HGET', KEYS[1], 'consecutive_failures') or '0')
if consecutive ~= tonumber(ARGV[3]) then return 0 end
redis.call('HSET', KEYS[1], 'status', 'cooldown', 'cooldown_until', ARGV[1])
if status ~= 'cooldown' then
  local provider = redis.call('HGET', KEYS[1], 'provider')
  local id = redis.call('HGET', KEYS[1], 'id')
  redis.call('SMOVE', ARGV[2] .. provider .. ':' .. status, ARGV[2] .. provider .. ':cooldown', id)
end
return 1
";

const DISABLE_SCRIPT: &str = r"
local status = redis.call('HGET', KEYS[1], 'status')
if not status then return -1 end
if status == 'disabled' then return 0 end
redis.call('HSET', KEYS[1], 'status', 'disabled', 'last_failure_reason', ARGV[1])
redis.call('HDEL', KEYS[1], 'cooldown_until')
local provider = redis.call('HGET', KEYS[1], 'provider')
local id = redis.call('HGET', KEYS[1], 'id')
redis.call('SMOVE', ARGV[2] .. provider .. ':' .. status, ARGV[2] .. provider .. ':disabled', id)
return 1
";

/// Redis-backed credential store
pub struct RedisCredentialStore {
    conn: redis::aio::ConnectionManager,
    prefix: String,
    success_script: Script,
    failure_script: Script,
    cooldown_script: Script,
    disable_script: Script,
}

impl RedisCredentialStore {
    /// Create a store using the default `keypool` key prefix
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self::with_prefix(conn, keys::DEFAULT_PREFIX)
    }

    /// Create a store under a custom key prefix (used to isolate tests)
    pub fn with_prefix(conn: redis::aio::ConnectionManager, prefix: &str) -> Self {
        Self {
            conn,
            prefix: prefix.to_string(),
            success_script: Script::new(SUCCESS_SCRIPT),
            failure_script: Script::new(FAILURE_SCRIPT),
            cooldown_script: Script::new(COOLDOWN_SCRIPT),
            disable_script: Script::new(DISABLE_SCRIPT),
        }
    }

    async fn fetch_many(&self, ids: Vec<String>) -> StoreResult<Vec<Credential>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.hgetall(keys::credential(&self.prefix, id));
        }
        let rows: Vec<HashMap<String, String>> = pipe.query_async(&mut conn).await?;
        Ok(decode_rows(&ids, rows))
    }

    async fn index_members(
        &self,
        provider: &str,
        statuses: &[CredentialStatus],
    ) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let index_keys: Vec<String> = statuses
            .iter()
            .map(|status| keys::index(&self.prefix, provider, *status))
            .collect();
        let ids: Vec<String> = conn.sunion(index_keys).await?;
        Ok(ids)
    }
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn insert(&self, credential: Credential) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let key = keys::credential(&self.prefix, &credential.id);
        let fields = encode(&credential);

        let mut pipe = redis::pipe();
        pipe.atomic().del(&key).ignore().hset_multiple(&key, &fields).ignore();
        // Re-inserting an id must not leave it indexed under its old status
        for status in CredentialStatus::ALL {
            pipe.srem(keys::index(&self.prefix, &credential.provider, status), &credential.id)
                .ignore();
        }
        pipe.sadd(
            keys::index(&self.prefix, &credential.provider, credential.status),
            &credential.id,
        )
        .ignore()
        .sadd(keys::providers(&self.prefix), &credential.provider)
        .ignore()
        .query_async::<_, ()>(&mut conn)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Credential>> {
        let mut conn = self.conn.clone();
        let row: HashMap<String, String> = conn.hgetall(keys::credential(&self.prefix, id)).await?;
        if row.is_empty() {
            return Ok(None);
        }
        decode(id, &row).map(Some)
    }

    async fn list_by_provider(&self, provider: &str) -> StoreResult<Vec<Credential>> {
        let ids = self.index_members(provider, &CredentialStatus::ALL).await?;
        self.fetch_many(ids).await
    }

    async fn list_candidates(&self, provider: &str) -> StoreResult<Vec<Credential>> {
        let ids = self
            .index_members(
                provider,
                &[CredentialStatus::Active, CredentialStatus::Cooldown],
            )
            .await?;
        self.fetch_many(ids).await
    }

    async fn providers(&self) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut providers: Vec<String> = conn.smembers(keys::providers(&self.prefix)).await?;
        providers.sort();
        Ok(providers)
    }

    async fn apply_success(&self, id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let result: i64 = self
            .success_script
            .key(keys::credential(&self.prefix, id))
            .arg(now.timestamp_millis())
            .arg(keys::index_prefix(&self.prefix))
            .invoke_async(&mut conn)
            .await?;

        if result < 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn apply_failure(
        &self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<FailureCounters> {
        let mut conn = self.conn.clone();
        let counters: Vec<i64> = self
            .failure_script
            .key(keys::credential(&self.prefix, id))
            .arg(reason)
            .arg(now.timestamp_millis())
            .invoke_async(&mut conn)
            .await?;

        match counters.as_slice() {
            [consecutive, total] => Ok(FailureCounters {
                consecutive_failures: u32::try_from(*consecutive).unwrap_or(u32::MAX),
                total_failures: u64::try_from(*total).unwrap_or_default(),
            }),
            _ => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn enter_cooldown(
        &self,
        id: &str,
        until: DateTime<Utc>,
        expected_failures: u32,
    ) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let result: i64 = self
            .cooldown_script
            .key(keys::credential(&self.prefix, id))
            .arg(until.timestamp_millis())
            .arg(keys::index_prefix(&self.prefix))
            .arg(expected_failures)
            .invoke_async(&mut conn)
            .await?;

        match result {
            r if r < 0 => Err(StoreError::NotFound(id.to_string())),
            r => Ok(r == 1),
        }
    }

    async fn disable(&self, id: &str, reason: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let result: i64 = self
            .disable_script
            .key(keys::credential(&self.prefix, id))
            .arg(reason)
            .arg(keys::index_prefix(&self.prefix))
            .invoke_async(&mut conn)
            .await?;

        match result {
            r if r < 0 => Err(StoreError::NotFound(id.to_string())),
            r => Ok(r == 1),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;
        Ok(())
    }
}

fn encode(credential: &Credential) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("id", credential.id.clone()),
        ("provider", credential.provider.clone()),
        ("secret", credential.secret.clone()),
        ("status", credential.status.as_str().to_string()),
        (
            "consecutive_failures",
            credential.consecutive_failures.to_string(),
        ),
        ("total_successes", credential.total_successes.to_string()),
        ("total_failures", credential.total_failures.to_string()),
        (
            "created_at",
            credential.created_at.timestamp_millis().to_string(),
        ),
    ];
    if let Some(label) = &credential.label {
        fields.push(("label", label.clone()));
    }
    if let Some(at) = credential.last_used_at {
        fields.push(("last_used_at", at.timestamp_millis().to_string()));
    }
    if let Some(until) = credential.cooldown_until {
        fields.push(("cooldown_until", until.timestamp_millis().to_string()));
    }
    if let Some(reason) = &credential.last_failure_reason {
        fields.push(("last_failure_reason", reason.clone()));
    }
    fields
}

/// Decode a pipelined batch of hashes, skipping rows that cannot be used.
///
/// An empty row is an index entry whose hash was removed out-of-band. A
/// corrupt row is logged and dropped so one bad record cannot hide the rest
/// of the provider's credentials from selection.
fn decode_rows(ids: &[String], rows: Vec<HashMap<String, String>>) -> Vec<Credential> {
    let mut credentials = Vec::with_capacity(rows.len());
    for (id, row) in ids.iter().zip(rows) {
        if row.is_empty() {
            continue;
        }
        match decode(id, &row) {
            Ok(credential) => credentials.push(credential),
            Err(e) => warn!(credential_id = %id, error = %e, "Skipping corrupt credential record"),
        }
    }
    credentials
}

fn decode(id: &str, row: &HashMap<String, String>) -> StoreResult<Credential> {
    let corrupt = |detail: String| StoreError::Corrupt {
        id: id.to_string(),
        detail,
    };

    let required = |field: &str| {
        row.get(field)
            .cloned()
            .ok_or_else(|| corrupt(format!("missing field '{}'", field)))
    };
    let number = |field: &str| -> StoreResult<u64> {
        match row.get(field) {
            Some(raw) => raw
                .parse()
                .map_err(|_| corrupt(format!("field '{}' is not a number", field))),
            None => Ok(0),
        }
    };
    let timestamp = |field: &str| -> StoreResult<Option<DateTime<Utc>>> {
        match row.get(field) {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis)
                .map(Some)
                .ok_or_else(|| corrupt(format!("field '{}' is not a timestamp", field))),
            None => Ok(None),
        }
    };

    Ok(Credential {
        id: required("id")?,
        provider: required("provider")?,
        secret: required("secret")?,
        label: row.get("label").cloned(),
        status: required("status")?.parse().map_err(corrupt)?,
        consecutive_failures: u32::try_from(number("consecutive_failures")?).unwrap_or(u32::MAX),
        total_successes: number("total_successes")?,
        total_failures: number("total_failures")?,
        last_used_at: timestamp("last_used_at")?,
        cooldown_until: timestamp("cooldown_until")?,
        last_failure_reason: row.get("last_failure_reason").cloned(),
        created_at: timestamp("created_at")?.unwrap_or_else(Utc::now),
    })
}

/// Redis key layout
pub mod keys {
    use crate::credentials::model::CredentialStatus;

    pub const DEFAULT_PREFIX: &str = "keypool";

    /// Hash holding one credential
    pub fn credential(prefix: &str, id: &str) -> String {
        format!("{}:credential:{}", prefix, id)
    }

    /// Prefix shared by all index sets; scripts append `{provider}:{status}`
    pub fn index_prefix(prefix: &str) -> String {
        format!("{}:index:", prefix)
    }

    /// Set of credential ids for a provider in a given status
    pub fn index(prefix: &str, provider: &str, status: CredentialStatus) -> String {
        format!("{}{}:{}", index_prefix(prefix), provider, status.as_str())
    }

    /// Set of provider names
    pub fn providers(prefix: &str) -> String {
        format!("{}:providers", prefix)
    }
}
