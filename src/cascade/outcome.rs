//! Cascade result types

use serde::Serialize;

use crate::provider::ProviderError;

/// Caller-facing error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Store has nothing eligible and no fallback is configured
    NoCredentialAvailable,
    /// Secret failed format validation before use
    InvalidCredentialFormat,
    /// HTTP 429 or quota wording from the provider
    ProviderQuotaExceeded,
    /// Timeout, 5xx or transport failure
    ProviderTransientError,
    /// The provider refused the credential (401/403)
    CredentialRejected,
    /// Every model variant failed for the chosen credential
    AllVariantsExhausted,
}

/// One failed attempt, classified
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptError {
    pub kind: ErrorKind,
    pub model: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl AttemptError {
    pub fn from_provider(model: &str, error: &ProviderError) -> Self {
        let kind = if error.is_quota() {
            ErrorKind::ProviderQuotaExceeded
        } else if error.is_credential_rejected() {
            ErrorKind::CredentialRejected
        } else {
            ErrorKind::ProviderTransientError
        };
        Self {
            kind,
            model: model.to_string(),
            message: error.to_string(),
            http_status: error.http_status(),
        }
    }

    pub fn is_quota(&self) -> bool {
        self.kind == ErrorKind::ProviderQuotaExceeded
    }

    pub fn is_credential_rejected(&self) -> bool {
        self.kind == ErrorKind::CredentialRejected
    }
}

/// Result of one model-variant attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptResult {
    Success(String),
    /// Advance to the next variant
    TransientFailure(AttemptError),
    /// Stop the cascade; the attempt itself could not complete
    FatalFailure(AttemptError),
}

impl AttemptResult {
    /// Classify a provider call result.
    ///
    /// Every provider error advances, rejections (401/403) included.
    pub fn classify(model: &str, result: Result<String, ProviderError>) -> Self {
        match result {
            Ok(text) => AttemptResult::Success(text),
            Err(e) => AttemptResult::TransientFailure(AttemptError::from_provider(model, &e)),
        }
    }
}

/// Discriminated result of one cascade run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_credential_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub quota_exceeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<AttemptError>,
}

impl RequestOutcome {
    pub fn succeeded(text: String, credential_id: Option<String>, model: &str) -> Self {
        Self {
            success: true,
            text: Some(text),
            used_credential_id: credential_id,
            model_used: Some(model.to_string()),
            error_kind: None,
            quota_exceeded: false,
            last_error: None,
        }
    }

    pub fn no_credential() -> Self {
        Self::failed(ErrorKind::NoCredentialAvailable, None, None)
    }

    /// All variants tried; `quota_exceeded` follows the last failure
    pub fn exhausted(credential_id: Option<String>, last_error: Option<AttemptError>) -> Self {
        Self::failed(ErrorKind::AllVariantsExhausted, credential_id, last_error)
    }

    fn failed(
        kind: ErrorKind,
        credential_id: Option<String>,
        last_error: Option<AttemptError>,
    ) -> Self {
        Self {
            success: false,
            text: None,
            used_credential_id: credential_id,
            model_used: None,
            error_kind: Some(kind),
            quota_exceeded: last_error.as_ref().map(AttemptError::is_quota).unwrap_or(false),
            last_error,
        }
    }
}
