//! Credential pool facade
//!
//! The inbound interface used by feature code: select a credential, report
//! usage and failures, or run a full model cascade.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::cascade::{ModelCascadeOrchestrator, ModelCatalog, RequestOutcome};
use crate::credentials::model::normalize_provider;
use crate::credentials::{
    Credential, CredentialSelector, CredentialStatus, CredentialStore, CredentialView,
    EnvFallbackResolver, HealthPolicy, HealthRecorder, NewCredential, SelectedCredential,
    StoreResult,
};
use crate::provider::ProviderClient;

/// Per-status counts for one provider
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderSummary {
    pub provider: String,
    pub active: usize,
    pub cooldown: usize,
    pub disabled: usize,
    pub fallback_configured: usize,
    pub model_variants: Vec<String>,
}

/// Shared credential pool service
pub struct CredentialPool {
    store: Arc<dyn CredentialStore>,
    policy: Arc<HealthPolicy>,
    selector: Arc<CredentialSelector>,
    recorder: Arc<HealthRecorder>,
    fallback: Arc<EnvFallbackResolver>,
    orchestrator: ModelCascadeOrchestrator,
    catalog: ModelCatalog,
}

impl CredentialPool {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        policy: HealthPolicy,
        fallback: EnvFallbackResolver,
        catalog: ModelCatalog,
        client: Arc<dyn ProviderClient>,
        attempt_timeout: Duration,
    ) -> Self {
        let policy = Arc::new(policy);
        let fallback = Arc::new(fallback);
        let selector = Arc::new(CredentialSelector::new(store.clone(), policy.clone()));
        let recorder = Arc::new(HealthRecorder::new(store.clone(), policy.clone()));
        let orchestrator = ModelCascadeOrchestrator::new(
            selector.clone(),
            fallback.clone(),
            recorder.clone(),
            client,
            attempt_timeout,
        );

        Self {
            store,
            policy,
            selector,
            recorder,
            fallback,
            orchestrator,
            catalog,
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Best tracked credential for `provider`.
    ///
    /// Environment fallbacks are not returned here; only the cascade uses them.
    pub async fn select_credential(&self, provider: &str) -> Option<SelectedCredential> {
        let provider = normalize_provider(provider);
        self.selector
            .get_best_credential(&provider)
            .await
            .map(|c| SelectedCredential::tracked(&c))
    }

    /// Report the result of a call made with a selected credential.
    ///
    /// Fire-and-forget: the update is applied on a background task and never
    /// fails the caller. A failed call records `note` as the failure reason.
    pub fn record_usage(&self, credential_id: &str, success: bool, note: Option<&str>) {
        let recorder = self.recorder.clone();
        let id = credential_id.to_string();
        let note = note.map(str::to_string);
        tokio::spawn(async move {
            if success {
                recorder.record_success(&id, note.as_deref()).await;
            } else {
                let reason = note.unwrap_or_else(|| "unspecified failure".to_string());
                recorder.record_failure(&id, &reason).await;
            }
        });
    }

    /// Report a failed call. Fire-and-forget.
    pub fn record_failure(&self, credential_id: &str, reason: &str) {
        self.record_usage(credential_id, false, Some(reason));
    }

    /// Run `prompt` through the cascade.
    ///
    /// An empty `variants` list uses the provider's configured defaults.
    pub async fn generate_with_cascade(
        &self,
        provider: &str,
        prompt: &str,
        variants: &[String],
    ) -> RequestOutcome {
        let provider = normalize_provider(provider);
        let variants = if variants.is_empty() {
            self.catalog.variants_for(&provider)
        } else {
            variants
        };
        self.orchestrator.run(&provider, prompt, variants).await
    }

    /// Provision a new credential
    pub async fn provision(&self, new: NewCredential) -> StoreResult<Credential> {
        let credential = new.into_credential();
        self.store.insert(credential.clone()).await?;
        info!(
            provider = %credential.provider,
            credential_id = %credential.id,
            "Credential provisioned"
        );
        Ok(credential)
    }

    /// Manually disable a credential. Returns false if it was already disabled.
    pub async fn disable(&self, credential_id: &str, reason: &str) -> StoreResult<bool> {
        self.store.disable(credential_id, reason).await
    }

    /// Secret-free views of a provider's credentials, effective status applied
    pub async fn list(&self, provider: &str) -> StoreResult<Vec<CredentialView>> {
        let now = Utc::now();
        let mut credentials = self
            .store
            .list_by_provider(&normalize_provider(provider))
            .await?;
        credentials.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(credentials
            .iter()
            .map(|c| CredentialView::new(c, self.policy.refresh(c, now)))
            .collect())
    }

    /// Status counts for a provider
    pub async fn summary(&self, provider: &str) -> StoreResult<ProviderSummary> {
        let provider = normalize_provider(provider);
        let now = Utc::now();
        let credentials = self.store.list_by_provider(&provider).await?;

        let mut summary = ProviderSummary {
            provider: provider.clone(),
            fallback_configured: self.fallback.configured(&provider),
            model_variants: self.catalog.variants_for(&provider).to_vec(),
            ..Default::default()
        };
        for credential in &credentials {
            match self.policy.refresh(credential, now) {
                CredentialStatus::Active => summary.active += 1,
                CredentialStatus::Cooldown => summary.cooldown += 1,
                CredentialStatus::Disabled => summary.disabled += 1,
            }
        }
        Ok(summary)
    }

    /// Seed credentials from a JSON array of `{provider, secret, label?}`.
    ///
    /// Entries whose secret is already stored for the provider are skipped,
    /// so restarting with the same file is harmless.
    pub async fn seed(&self, entries: Vec<NewCredential>) -> Result<usize> {
        let mut existing: HashMap<String, Vec<String>> = HashMap::new();
        let mut seeded = 0;

        for entry in entries {
            let provider = normalize_provider(&entry.provider);
            if !existing.contains_key(&provider) {
                let secrets = self
                    .store
                    .list_by_provider(&provider)
                    .await
                    .with_context(|| format!("Failed to list credentials for {}", provider))?
                    .into_iter()
                    .map(|c| c.secret)
                    .collect();
                existing.insert(provider.clone(), secrets);
            }

            let known = existing.entry(provider.clone()).or_default();
            if known.contains(&entry.secret) {
                continue;
            }
            known.push(entry.secret.clone());
            self.provision(entry)
                .await
                .with_context(|| format!("Failed to seed credential for {}", provider))?;
            seeded += 1;
        }

        if seeded > 0 {
            info!(seeded, "Seeded credentials");
        }
        Ok(seeded)
    }

    /// Seed credentials from a JSON file on disk
    pub async fn seed_from_file(&self, path: &str) -> Result<usize> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read credentials file {}", path))?;
        let entries: Vec<NewCredential> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid credentials file {}", path))?;
        if entries.is_empty() {
            warn!(path = %path, "Credentials file is empty");
        }
        self.seed(entries).await
    }
}
