//! Provider registry.
//!
//! Constructs and holds all configured provider instances at startup.
//! Providers that fail to initialize are logged and skipped rather than
//! aborting the whole process.

use std::collections::HashMap;
use std::sync::Arc;

use cc_domain::config::Config;
use cc_domain::error::{Error, Result};

use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::ProviderClient;

/// Holds all instantiated providers, keyed by provider id.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    /// Build the registry from the application config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();

        for pc in &config.providers {
            match OpenAiCompatProvider::from_config(pc, &config.history) {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, model = %pc.model, "registered provider");
                    providers.insert(pc.id.clone(), Arc::new(provider));
                }
                Err(e) => {
                    tracing::warn!(
                        provider_id = %pc.id,
                        error = %e,
                        "failed to initialize provider, skipping"
                    );
                }
            }
        }

        if providers.is_empty() {
            return Err(Error::Config(
                "no usable providers; configure at least one [[providers]] entry".into(),
            ));
        }

        Ok(Self { providers })
    }

    /// Build a registry from already-instantiated providers (embedding and
    /// test harness use).
    pub fn from_providers(providers: HashMap<String, Arc<dyn ProviderClient>>) -> Self {
        Self { providers }
    }

    /// Look up a provider by id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderClient>> {
        self.providers.get(provider_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
