//! Cascaded generation endpoint
//!
//! `POST /v1/generate` runs a prompt through the provider's model cascade.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cascade::variants::is_valid_model_name,
    error::{AppError, AppResult},
    AppState,
};

/// Generation request body
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub provider: String,
    pub prompt: String,
    /// Ordered model variants; defaults to the provider's configured list
    #[serde(default)]
    pub variants: Vec<String>,
}

/// Successful generation response
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub text: String,
    pub model: String,
    /// `None` when an environment fallback secret was used
    pub credential_id: Option<String>,
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    if request.provider.trim().is_empty() {
        return Err(AppError::BadRequest("provider must not be empty".to_string()));
    }
    if request.prompt.trim().is_empty() {
        return Err(AppError::BadRequest("prompt must not be empty".to_string()));
    }
    if let Some(bad) = request.variants.iter().find(|m| !is_valid_model_name(m)) {
        return Err(AppError::BadRequest(format!("invalid model variant '{}'", bad)));
    }

    debug!(
        provider = %request.provider,
        variants = request.variants.len(),
        "Generation requested"
    );

    let outcome = state
        .pool
        .generate_with_cascade(&request.provider, &request.prompt, &request.variants)
        .await;

    match (outcome.success, outcome.text.clone(), outcome.model_used.clone()) {
        (true, Some(text), Some(model)) => Ok(Json(GenerateResponse {
            text,
            model,
            credential_id: outcome.used_credential_id,
        })),
        _ => {
            let retry_after = state.config.cooldown_initial_seconds;
            Err(AppError::from_outcome(&outcome, Some(retry_after)))
        }
    }
}
