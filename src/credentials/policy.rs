//! Credential health policy with exponential cooldown
//!
//! Pure decision functions shared by the selector, the recorders and the
//! cascade: eligibility, cooldown duration, selection ordering and error
//! classification. Nothing in here touches storage.

use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use super::model::{Credential, CredentialStatus};

/// Printable ASCII without whitespace, 8 to 512 characters
static SECRET_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\x21-\x7E]{8,512}$").expect("secret format regex is valid")
});

/// Configuration for health tracking
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Consecutive failures before a credential enters cooldown (default: 3)
    pub failure_threshold: u32,
    /// Cooldown applied when the threshold is first reached (default: 30 seconds)
    pub initial_cooldown: Duration,
    /// Maximum cooldown duration (default: 10 minutes)
    pub max_cooldown: Duration,
    /// Multiplier for each failure beyond the threshold (default: 2.0)
    pub backoff_multiplier: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            initial_cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(600),
            backoff_multiplier: 2.0,
        }
    }
}

/// Health decisions for credentials
#[derive(Debug, Clone, Default)]
pub struct HealthPolicy {
    config: HealthConfig,
}

impl HealthPolicy {
    pub fn new(config: HealthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Effective status at `now`.
    ///
    /// A cooldown whose `cooldown_until` has passed reads as Active. This is a
    /// view only: the stored status is left alone until the next success.
    pub fn refresh(&self, credential: &Credential, now: DateTime<Utc>) -> CredentialStatus {
        match credential.status {
            CredentialStatus::Cooldown => match credential.cooldown_until {
                Some(until) if now >= until => CredentialStatus::Active,
                Some(_) => CredentialStatus::Cooldown,
                // Cooldown without a deadline cannot expire on its own
                None => CredentialStatus::Cooldown,
            },
            status => status,
        }
    }

    /// Whether the credential may be handed out at `now`
    pub fn is_eligible(&self, credential: &Credential, now: DateTime<Utc>) -> bool {
        self.refresh(credential, now) == CredentialStatus::Active
    }

    /// Whether a failure count has reached the cooldown threshold
    pub fn should_cool_down(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.config.failure_threshold
    }

    /// Cooldown for a given failure count: initial * multiplier^(failures - threshold), capped
    pub fn cooldown_duration(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(self.config.failure_threshold);
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let max_secs = self.config.max_cooldown.as_secs_f64();
        let secs = self.config.initial_cooldown.as_secs_f64()
            * self.config.backoff_multiplier.powi(exponent);

        Duration::try_from_secs_f64(secs.min(max_secs)).unwrap_or(self.config.max_cooldown)
    }

    /// Deadline of a cooldown entered at `now`
    pub fn cooldown_until(&self, consecutive_failures: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let duration = self.cooldown_duration(consecutive_failures);
        chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Selection order: fewest consecutive failures, then least recently used
    /// (never used first), then id for determinism.
    pub fn selection_order(a: &Credential, b: &Credential) -> Ordering {
        a.consecutive_failures
            .cmp(&b.consecutive_failures)
            .then_with(|| match (a.last_used_at, b.last_used_at) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => x.cmp(&y),
            })
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Quota classification: HTTP 429 first, message text as a fallback heuristic
pub fn is_quota_error(http_status: Option<u16>, message: &str) -> bool {
    if http_status == Some(429) {
        return true;
    }
    let lowered = message.to_ascii_lowercase();
    lowered.contains("429") || lowered.contains("quota")
}

/// Reason a secret was rejected before use
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSecret {
    #[error("secret is empty")]
    Empty,
    #[error("secret must be 8-512 printable characters without whitespace")]
    Malformed,
}

/// Validate secret material before it is sent to a provider
pub fn validate_secret(secret: &str) -> Result<(), InvalidSecret> {
    if secret.trim().is_empty() {
        return Err(InvalidSecret::Empty);
    }
    if !SECRET_FORMAT.is_match(secret) {
        return Err(InvalidSecret::Malformed);
    }
    Ok(())
}

/// Short, stable fingerprint of a secret for logs and admin views
pub fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(&digest[..6])
}
