//! Gemini `generateContent` client
//!
//! Thin adapter over the Generative Language REST API. The secret is passed
//! per call so a single client serves every credential in the pool.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{ProviderClient, ProviderError};
use crate::cascade::variants::is_valid_model_name;
use crate::config::Config;

/// Gemini REST client
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    /// Create a new Gemini client from configuration
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self::with_base_url(client, &config.gemini_api_url)
    }

    /// Create a client against an explicit base URL
    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn headers(secret: &str) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(secret)
            .map_err(|_| ProviderError::Transport("secret is not a valid header value".into()))?;
        headers.insert("x-goog-api-key", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, secret, prompt), fields(model = %model))]
    async fn generate(
        &self,
        secret: &str,
        model: &str,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        if !is_valid_model_name(model) {
            return Err(ProviderError::InvalidModel(model.to_string()));
        }
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .headers(Self::headers(secret)?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        debug!(status = %status, "Gemini response status");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(ProviderError::http(status.as_u16(), message));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "response contained no text".to_string(),
            ));
        }
        Ok(text)
    }
}
