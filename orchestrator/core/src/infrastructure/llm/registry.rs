// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Adapter Set - Provider Identity Resolution
//
// Maps provider identifiers used in task requests to the adapter that serves
// them. Built once at startup from configuration and shared read-only.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::llm::{LLMError, LLMProvider, ProviderAdapter};
use crate::domain::node_config::{resolve_secret, MockProviderConfig, ProviderConfig};
use crate::domain::task::ProviderId;

use super::adapter::VendorAdapter;
use super::anthropic::AnthropicAdapter;
use super::mock::MockAdapter;
use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;

/// Registry of provider adapters keyed by provider identifier
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: BTreeMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the adapter set from provider configuration
    pub fn from_config(providers: &[ProviderConfig]) -> anyhow::Result<Self> {
        let mut set = Self::new();

        info!("Initializing provider adapter set");

        for provider_config in providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            match Self::create_provider(provider_config) {
                Ok(provider) => {
                    info!(
                        provider = %provider_config.name,
                        provider_type = %provider_config.provider_type,
                        timeout_ms = provider_config.timeout.as_millis() as u64,
                        "Provider initialized"
                    );
                    set.insert(Arc::new(VendorAdapter::new(
                        ProviderId::new(provider_config.name.clone()),
                        provider,
                        provider_config.timeout,
                        provider_config.cost_per_1k_tokens,
                    )));
                }
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", provider_config.name, e);
                    // Continue with other providers
                }
            }
        }

        if set.is_empty() {
            anyhow::bail!("No providers could be initialized");
        }

        Ok(set)
    }

    /// Create a vendor client from configuration
    fn create_provider(config: &ProviderConfig) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let api_key = match &config.api_key {
            Some(key) => resolve_secret(key)?,
            None => String::new(), // For local providers without auth
        };

        let provider: Arc<dyn LLMProvider> = match config.provider_type.as_str() {
            "openai" | "openai-compatible" => Arc::new(OpenAIAdapter::new(
                config.endpoint.clone(),
                api_key,
                config.model.clone(),
            )),
            "anthropic" => Arc::new(AnthropicAdapter::new(
                config.endpoint.clone(),
                api_key,
                config.model.clone(),
            )),
            "ollama" => Arc::new(OllamaAdapter::new(config.endpoint.clone(), config.model.clone())),
            "mock" => {
                let mock = config.mock.clone().unwrap_or_else(MockProviderConfig::default);
                Arc::new(MockAdapter::new(mock.latency, mock.response))
            }
            _ => anyhow::bail!("Unsupported provider type: {}", config.provider_type),
        };

        Ok(provider)
    }

    /// Register an adapter, replacing any previous one with the same id
    pub fn insert(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.id().clone(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.insert(adapter);
        self
    }

    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(id).cloned()
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.adapters.contains_key(id)
    }

    pub fn ids(&self) -> Vec<ProviderId> {
        self.adapters.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Check health of all providers
    pub async fn health_check_all(&self) -> BTreeMap<ProviderId, Result<(), LLMError>> {
        let checks = self.adapters.iter().map(|(id, adapter)| async move {
            (id.clone(), adapter.health_check().await)
        });
        futures::future::join_all(checks).await.into_iter().collect()
    }
}
