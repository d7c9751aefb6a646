//! Model variant catalog
//!
//! Static, ordered model lists per provider, cheapest/fastest first.

use std::collections::HashMap;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::credentials::model::normalize_provider;

/// Default catalog when none is configured
pub const DEFAULT_MODEL_VARIANTS: &str = "gemini=gemini-2.0-flash,gemini-1.5-pro";

/// Model names end up as a URL path segment
static MODEL_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("model name regex is valid")
});

/// Whether `name` is safe to use as a model variant
pub fn is_valid_model_name(name: &str) -> bool {
    MODEL_NAME.is_match(name)
}

/// Ordered model variants per provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelCatalog {
    variants: HashMap<String, Vec<String>>,
}

impl ModelCatalog {
    /// Parse `provider=model1,model2;provider2=model3`
    pub fn parse(spec: &str) -> Result<Self> {
        let mut variants = HashMap::new();

        for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((provider, models)) = entry.split_once('=') else {
                bail!("Invalid model variant entry '{}': expected provider=model,...", entry);
            };
            let provider = normalize_provider(provider);
            if provider.is_empty() {
                bail!("Invalid model variant entry '{}': empty provider", entry);
            }
            let models: Vec<String> = models
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
            if models.is_empty() {
                bail!("No model variants listed for provider '{}'", provider);
            }
            if let Some(bad) = models.iter().find(|m| !is_valid_model_name(m)) {
                bail!("Invalid model name '{}' for provider '{}'", bad, provider);
            }
            variants.insert(provider, models);
        }

        Ok(Self { variants })
    }

    /// Ordered variants for `provider` (empty when unknown)
    pub fn variants_for(&self, provider: &str) -> &[String] {
        self.variants
            .get(provider)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }
}
