//! Error types for keypool
//!
//! This module defines the HTTP-facing error type and how cascade outcomes
//! map onto it.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::cascade::{AttemptError, ErrorKind, RequestOutcome};
use crate::credentials::StoreError;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        message: String,
        retry_after: Option<u64>,
        error_kind: Option<ErrorKind>,
    },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        message: String,
        error_kind: Option<ErrorKind>,
    },

    #[error("Upstream error: {message}")]
    UpstreamError {
        message: String,
        error_kind: Option<ErrorKind>,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Map a failed cascade outcome to an HTTP error.
    ///
    /// Quota exhaustion becomes a 429 so clients can retry shortly; a run
    /// whose last attempt was refused (401/403) is a 502; every other
    /// failure is a 503.
    pub fn from_outcome(outcome: &RequestOutcome, retry_after: Option<u64>) -> Self {
        let error_kind = outcome.error_kind;
        let detail = outcome
            .last_error
            .as_ref()
            .map(|e| format!(" (last error on {}: {})", e.model, e.message))
            .unwrap_or_default();

        match error_kind {
            Some(ErrorKind::NoCredentialAvailable) => AppError::ServiceUnavailable {
                message: "No credential available for provider".to_string(),
                error_kind,
            },
            _ if outcome.quota_exceeded => AppError::QuotaExceeded {
                message: format!("Provider quota exceeded, try again shortly{}", detail),
                retry_after,
                error_kind,
            },
            _ if outcome
                .last_error
                .as_ref()
                .is_some_and(AttemptError::is_credential_rejected) =>
            {
                AppError::UpstreamError {
                    message: format!("Provider rejected the credential{}", detail),
                    error_kind,
                }
            }
            _ => AppError::ServiceUnavailable {
                message: format!("All model variants failed{}", detail),
                error_kind,
            },
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Additional error details for cascade failures
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub quota_exceeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            AppError::QuotaExceeded {
                message,
                retry_after,
                error_kind,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                "QUOTA_EXCEEDED",
                message.clone(),
                Some(ErrorDetails {
                    error_kind: *error_kind,
                    quota_exceeded: true,
                    retry_after: *retry_after,
                }),
            ),
            AppError::ServiceUnavailable {
                message,
                error_kind,
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                message.clone(),
                Some(ErrorDetails {
                    error_kind: *error_kind,
                    quota_exceeded: false,
                    retry_after: None,
                }),
            ),
            AppError::UpstreamError {
                message,
                error_kind,
            } => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                message.clone(),
                Some(ErrorDetails {
                    error_kind: *error_kind,
                    quota_exceeded: false,
                    retry_after: None,
                }),
            ),
            AppError::Store(StoreError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Credential not found: {}", id),
                None,
            ),
            AppError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
                "Credential store error".to_string(),
                None,
            ),
            AppError::JsonError(_) => (
                StatusCode::BAD_REQUEST,
                "INVALID_JSON",
                "Invalid JSON in request".to_string(),
                None,
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
                None,
            ),
        };

        let retry_after = match &self {
            AppError::QuotaExceeded { retry_after, .. } => *retry_after,
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
