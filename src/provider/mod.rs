//! Generative-text provider abstraction
//!
//! Defines the transport boundary the cascade calls through. Implementations
//! only move text over the wire and classify failures; retries, credential
//! choice and bookkeeping live in the cascade.

pub mod gemini;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::credentials::policy::is_quota_error;

pub use gemini::GeminiClient;

/// Failure reported by a provider call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("provider call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("invalid model name: {0}")]
    InvalidModel(String),
}

impl ProviderError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ProviderError::Http {
            status,
            message: message.into(),
        }
    }

    /// HTTP status, when the provider answered at all
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Rate/usage limit breach (HTTP 429, or quota wording in the message)
    pub fn is_quota(&self) -> bool {
        is_quota_error(self.http_status(), &self.to_string())
    }

    /// The provider refused the credential itself
    pub fn is_credential_rejected(&self) -> bool {
        matches!(self.http_status(), Some(401) | Some(403))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ProviderError::Transport(format!("request timed out: {}", e));
        }
        ProviderError::Transport(e.to_string())
    }
}

/// Transport to a generative-text provider
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Generate text for `prompt` with `model`, authenticating with `secret`
    async fn generate(&self, secret: &str, model: &str, prompt: &str)
        -> Result<String, ProviderError>;
}
