//! Health check endpoints
//!
//! Provides endpoints for monitoring and container orchestration:
//! - `/health` - Full health check with store status and pool summary
//! - `/health/ready` - Readiness check
//! - `/health/live` - Liveness check

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::pool::ProviderSummary;
use crate::AppState;

/// Health status enum
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual dependency check result
#[derive(Debug, Serialize)]
pub struct DependencyCheck {
    pub status: HealthStatus,
    pub backend: &'static str,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Dependency checks collection
#[derive(Debug, Serialize)]
pub struct DependencyChecks {
    pub store: DependencyCheck,
}

/// Full health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: String,
    pub checks: DependencyChecks,
    pub providers: Vec<ProviderSummary>,
}

/// Simple health response for liveness/readiness
#[derive(Debug, Serialize)]
pub struct SimpleHealthResponse {
    pub status: HealthStatus,
}

/// Check credential store connectivity
async fn check_store(state: &AppState) -> DependencyCheck {
    let start = Instant::now();
    let store = state.pool.store();

    match store.ping().await {
        Ok(()) => DependencyCheck {
            status: HealthStatus::Healthy,
            backend: store.backend(),
            latency_ms: start.elapsed().as_millis() as u64,
            error: None,
        },
        Err(e) => DependencyCheck {
            status: HealthStatus::Unhealthy,
            backend: store.backend(),
            latency_ms: start.elapsed().as_millis() as u64,
            error: Some(e.to_string()),
        },
    }
}

/// Summaries for every provider known to the catalog or the store
async fn provider_summaries(state: &AppState) -> Vec<ProviderSummary> {
    let pool = &state.pool;
    let mut providers: Vec<String> = pool.catalog().providers().map(str::to_string).collect();
    if let Ok(stored) = pool.store().providers().await {
        providers.extend(stored);
    }
    providers.sort();
    providers.dedup();

    let mut summaries = Vec::with_capacity(providers.len());
    for provider in providers {
        if let Ok(summary) = pool.summary(&provider).await {
            summaries.push(summary);
        }
    }
    summaries
}

/// Full health check endpoint
///
/// Degraded when a provider has neither an active credential nor a fallback.
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let store_check = check_store(&state).await;
    let providers = if store_check.status == HealthStatus::Healthy {
        provider_summaries(&state).await
    } else {
        Vec::new()
    };

    let starved = providers
        .iter()
        .any(|p| p.active == 0 && p.fallback_configured == 0);

    let overall_status = if store_check.status == HealthStatus::Unhealthy {
        HealthStatus::Unhealthy
    } else if starved {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let response = HealthResponse {
        status: overall_status.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks: DependencyChecks { store: store_check },
        providers,
    };

    let status_code = match overall_status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

/// Readiness check endpoint
///
/// Returns 200 OK once the credential store is reachable.
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SimpleHealthResponse>) {
    let store_check = check_store(&state).await;

    if store_check.status == HealthStatus::Unhealthy {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SimpleHealthResponse {
                status: HealthStatus::Unhealthy,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(SimpleHealthResponse {
            status: HealthStatus::Healthy,
        }),
    )
}

/// Liveness check endpoint
pub async fn liveness_check() -> (StatusCode, Json<SimpleHealthResponse>) {
    (
        StatusCode::OK,
        Json(SimpleHealthResponse {
            status: HealthStatus::Healthy,
        }),
    )
}
