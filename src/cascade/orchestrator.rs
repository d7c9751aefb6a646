//! Model-variant cascade
//!
//! Runs one prompt against an ordered list of model variants with a single
//! credential, recording the result of every attempt against that
//! credential. The first success wins; otherwise the caller receives one
//! aggregated, classified failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::outcome::{AttemptError, AttemptResult, RequestOutcome};
use crate::credentials::model::SelectedCredential;
use crate::credentials::policy::validate_secret;
use crate::credentials::{CredentialSelector, EnvFallbackResolver, HealthRecorder};
use crate::provider::{ProviderClient, ProviderError};
use crate::routes::metrics;

/// Upper bound on malformed store credentials disabled during one selection
const MAX_INVALID_SKIPS: usize = 16;

/// Everything one attempt needs, owned so it can run on its own task
struct Attempt {
    client: Arc<dyn ProviderClient>,
    recorder: Arc<HealthRecorder>,
    provider: String,
    credential: SelectedCredential,
    model: String,
    prompt: Arc<str>,
    timeout: Duration,
}

impl Attempt {
    async fn run(self) -> AttemptResult {
        let started = Instant::now();
        let call = tokio::time::timeout(
            self.timeout,
            self.client
                .generate(&self.credential.secret, &self.model, &self.prompt),
        )
        .await;
        let result = match call {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        };
        let elapsed = started.elapsed().as_secs_f64();

        let attempt = AttemptResult::classify(&self.model, result);
        match &attempt {
            AttemptResult::Success(_) => {
                metrics::record_attempt(&self.provider, &self.model, "success", elapsed);
                if let Some(id) = &self.credential.id {
                    self.recorder.record_success(id, Some(&self.model)).await;
                }
            }
            AttemptResult::TransientFailure(error) | AttemptResult::FatalFailure(error) => {
                let label = if error.is_quota() { "quota" } else { "failure" };
                metrics::record_attempt(&self.provider, &self.model, label, elapsed);
                if let Some(id) = &self.credential.id {
                    self.recorder.record_failure(id, &error.message).await;
                }
            }
        }
        attempt
    }
}

/// Top-level entry point for cascaded generation
pub struct ModelCascadeOrchestrator {
    selector: Arc<CredentialSelector>,
    fallback: Arc<EnvFallbackResolver>,
    recorder: Arc<HealthRecorder>,
    client: Arc<dyn ProviderClient>,
    attempt_timeout: Duration,
}

impl ModelCascadeOrchestrator {
    pub fn new(
        selector: Arc<CredentialSelector>,
        fallback: Arc<EnvFallbackResolver>,
        recorder: Arc<HealthRecorder>,
        client: Arc<dyn ProviderClient>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            selector,
            fallback,
            recorder,
            client,
            attempt_timeout,
        }
    }

    /// Run `prompt` through `variants` in order.
    ///
    /// Each attempt runs on a spawned task: if the caller goes away, the
    /// in-flight provider call and its bookkeeping still complete.
    pub async fn run(&self, provider: &str, prompt: &str, variants: &[String]) -> RequestOutcome {
        let Some(credential) = self.resolve_credential(provider).await else {
            warn!(provider = %provider, "No credential available");
            metrics::record_outcome(provider, "no_credential");
            return RequestOutcome::no_credential();
        };

        let prompt: Arc<str> = Arc::from(prompt);
        let mut last_error: Option<AttemptError> = None;

        for model in variants {
            let attempt = Attempt {
                client: self.client.clone(),
                recorder: self.recorder.clone(),
                provider: provider.to_string(),
                credential: credential.clone(),
                model: model.clone(),
                prompt: prompt.clone(),
                timeout: self.attempt_timeout,
            };

            let result = match tokio::spawn(attempt.run()).await {
                Ok(result) => result,
                Err(e) => AttemptResult::FatalFailure(AttemptError::from_provider(
                    model,
                    &ProviderError::Transport(format!("attempt task failed: {}", e)),
                )),
            };

            match result {
                AttemptResult::Success(text) => {
                    info!(
                        provider = %provider,
                        model = %model,
                        credential_id = credential.id.as_deref().unwrap_or("env"),
                        "Cascade succeeded"
                    );
                    metrics::record_outcome(provider, "success");
                    return RequestOutcome::succeeded(text, credential.id.clone(), model);
                }
                AttemptResult::TransientFailure(error) => {
                    debug!(
                        provider = %provider,
                        model = %model,
                        kind = ?error.kind,
                        error = %error.message,
                        "Model variant failed, advancing"
                    );
                    last_error = Some(error);
                }
                AttemptResult::FatalFailure(error) => {
                    warn!(
                        provider = %provider,
                        model = %model,
                        error = %error.message,
                        "Attempt aborted, stopping cascade"
                    );
                    last_error = Some(error);
                    break;
                }
            }
        }

        let outcome = RequestOutcome::exhausted(credential.id.clone(), last_error);
        warn!(
            provider = %provider,
            variants = variants.len(),
            quota_exceeded = outcome.quota_exceeded,
            "All model variants exhausted"
        );
        metrics::record_outcome(
            provider,
            if outcome.quota_exceeded { "quota_exceeded" } else { "exhausted" },
        );
        outcome
    }

    /// Best tracked credential, else the environment fallback.
    ///
    /// Store credentials with malformed secrets are disabled and skipped.
    async fn resolve_credential(&self, provider: &str) -> Option<SelectedCredential> {
        for _ in 0..MAX_INVALID_SKIPS {
            let Some(credential) = self.selector.get_best_credential(provider).await else {
                break;
            };
            match validate_secret(&credential.secret) {
                Ok(()) => {
                    metrics::record_selection(provider, "store");
                    return Some(SelectedCredential::tracked(&credential));
                }
                Err(e) => {
                    let reason = format!("invalid credential format: {}", e);
                    // Ok(false): a concurrent caller disabled it first, keep selecting.
                    // Err: the disable did not persist and reselecting would loop.
                    if self.recorder.disable(&credential.id, &reason).await.is_err() {
                        break;
                    }
                }
            }
        }

        let resolved = self.fallback.resolve(provider);
        if resolved.is_some() {
            metrics::record_selection(provider, "env");
        }
        resolved
    }
}
