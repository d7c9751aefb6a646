//! Credential admin endpoints
//!
//! Provisioning, listing and manual disabling. Secrets are accepted on
//! provisioning but never returned.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    credentials::{
        model::normalize_provider, policy::validate_secret, CredentialView, NewCredential,
    },
    error::{AppError, AppResult},
    pool::ProviderSummary,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub provider: String,
}

#[derive(Debug, Serialize)]
pub struct CredentialList {
    pub provider: String,
    pub credentials: Vec<CredentialView>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DisableRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DisableResponse {
    pub id: String,
    pub changed: bool,
}

/// `GET /v1/credentials?provider=`
pub async fn list_credentials(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<CredentialList>> {
    let credentials = state.pool.list(&query.provider).await?;
    Ok(Json(CredentialList {
        provider: normalize_provider(&query.provider),
        credentials,
    }))
}

/// `POST /v1/credentials`
pub async fn create_credential(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewCredential>,
) -> AppResult<(StatusCode, Json<CredentialView>)> {
    if request.provider.trim().is_empty() {
        return Err(AppError::BadRequest("provider must not be empty".to_string()));
    }
    validate_secret(&request.secret).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let credential = state.pool.provision(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(CredentialView::new(&credential, credential.status)),
    ))
}

/// `POST /v1/credentials/:id/disable`
pub async fn disable_credential(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<DisableRequest>>,
) -> AppResult<Json<DisableResponse>> {
    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| "disabled by administrator".to_string());
    let changed = state.pool.disable(&id, &reason).await?;
    Ok(Json(DisableResponse { id, changed }))
}

/// `GET /v1/providers/:provider/summary`
pub async fn provider_summary(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> AppResult<Json<ProviderSummary>> {
    let summary = state.pool.summary(&provider).await?;
    Ok(Json(summary))
}
