//! Credential data model
//!
//! A credential is one secret usable against one provider, together with the
//! health metadata the selector and recorders operate on.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::policy::fingerprint;

/// Lifecycle status of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    /// Eligible for selection
    Active,
    /// Temporarily ineligible until `cooldown_until`
    Cooldown,
    /// Terminal, set manually or after an invalid-format check
    Disabled,
}

impl CredentialStatus {
    pub const ALL: [CredentialStatus; 3] = [
        CredentialStatus::Active,
        CredentialStatus::Cooldown,
        CredentialStatus::Disabled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStatus::Active => "active",
            CredentialStatus::Cooldown => "cooldown",
            CredentialStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CredentialStatus::Active),
            "cooldown" => Ok(CredentialStatus::Cooldown),
            "disabled" => Ok(CredentialStatus::Disabled),
            other => Err(format!("unknown credential status '{}'", other)),
        }
    }
}

/// A provider credential with health metadata
#[derive(Clone, PartialEq)]
pub struct Credential {
    pub id: String,
    pub provider: String,
    /// Opaque secret material; never logged
    pub secret: String,
    pub label: Option<String>,
    pub status: CredentialStatus,
    pub consecutive_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub last_failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    /// Create a fresh, healthy credential with a generated id
    pub fn new(provider: &str, secret: &str, label: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider: normalize_provider(provider),
            secret: secret.to_string(),
            label,
            status: CredentialStatus::Active,
            consecutive_failures: 0,
            total_successes: 0,
            total_failures: 0,
            last_used_at: None,
            cooldown_until: None,
            last_failure_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Same as `new` but with a caller-chosen id
    pub fn with_id(id: &str, provider: &str, secret: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::new(provider, secret, None)
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("secret", &fingerprint(&self.secret))
            .field("label", &self.label)
            .field("status", &self.status)
            .field("consecutive_failures", &self.consecutive_failures)
            .field("total_successes", &self.total_successes)
            .field("total_failures", &self.total_failures)
            .field("last_used_at", &self.last_used_at)
            .field("cooldown_until", &self.cooldown_until)
            .field("last_failure_reason", &self.last_failure_reason)
            .finish()
    }
}

/// Provisioning input for a new credential
#[derive(Debug, Clone, Deserialize)]
pub struct NewCredential {
    pub provider: String,
    pub secret: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl NewCredential {
    pub fn into_credential(self) -> Credential {
        Credential::new(&self.provider, &self.secret, self.label)
    }
}

/// Counters returned by an atomic failure increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureCounters {
    pub consecutive_failures: u32,
    pub total_failures: u64,
}

/// Credential handed to callers: the secret plus an optional tracking id.
///
/// `id` is `None` for environment fallback secrets, which are never
/// health-tracked.
#[derive(Clone, PartialEq)]
pub struct SelectedCredential {
    pub id: Option<String>,
    pub secret: String,
}

impl SelectedCredential {
    pub fn tracked(credential: &Credential) -> Self {
        Self {
            id: Some(credential.id.clone()),
            secret: credential.secret.clone(),
        }
    }

    pub fn untracked(secret: &str) -> Self {
        Self {
            id: None,
            secret: secret.to_string(),
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.id.is_some()
    }
}

impl fmt::Debug for SelectedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedCredential")
            .field("id", &self.id)
            .field("secret", &fingerprint(&self.secret))
            .finish()
    }
}

/// Secret-free view of a credential for admin listings
#[derive(Debug, Clone, Serialize)]
pub struct CredentialView {
    pub id: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub fingerprint: String,
    pub status: CredentialStatus,
    pub consecutive_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CredentialView {
    /// Build a view, reporting `status` as the caller computed it (the
    /// effective status after a lazy cooldown refresh).
    pub fn new(credential: &Credential, status: CredentialStatus) -> Self {
        Self {
            id: credential.id.clone(),
            provider: credential.provider.clone(),
            label: credential.label.clone(),
            fingerprint: fingerprint(&credential.secret),
            status,
            consecutive_failures: credential.consecutive_failures,
            total_successes: credential.total_successes,
            total_failures: credential.total_failures,
            last_used_at: credential.last_used_at,
            cooldown_until: credential.cooldown_until,
            last_failure_reason: credential.last_failure_reason.clone(),
            created_at: credential.created_at,
        }
    }
}

/// Provider names are matched case-insensitively
pub fn normalize_provider(provider: &str) -> String {
    provider.trim().to_ascii_lowercase()
}
