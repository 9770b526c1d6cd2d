// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Vendor Adapter - binds a raw LLM client to a provider identity
//
// Turns `LLMProvider::generate` into the never-failing `ProviderAdapter`
// contract: the per-provider timeout is enforced here, token usage is priced,
// and every error is folded into a failed `ProviderResult`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::llm::{
    FailureKind, FinalPrompt, GenerationOptions, LLMError, LLMProvider, ProviderAdapter,
    ProviderResult, Usage,
};
use crate::domain::task::{ProviderId, TaskId};

pub struct VendorAdapter {
    id: ProviderId,
    provider: Arc<dyn LLMProvider>,
    timeout: Duration,
    cost_per_1k_tokens: f64,
}

impl VendorAdapter {
    pub fn new(
        id: ProviderId,
        provider: Arc<dyn LLMProvider>,
        timeout: Duration,
        cost_per_1k_tokens: f64,
    ) -> Self {
        Self {
            id,
            provider,
            timeout,
            cost_per_1k_tokens,
        }
    }
}

#[async_trait]
impl ProviderAdapter for VendorAdapter {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn execute(
        &self,
        prompt: &FinalPrompt,
        options: &GenerationOptions,
        task_id: TaskId,
    ) -> ProviderResult {
        let started = Instant::now();
        debug!(provider = %self.id, task_id = %task_id, "Calling provider");

        let outcome = tokio::time::timeout(
            self.timeout,
            self.provider.generate(prompt.as_str(), options),
        )
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(response)) => {
                debug!(
                    provider = %self.id,
                    task_id = %task_id,
                    latency_ms,
                    tokens = response.usage.total_tokens,
                    "Provider call succeeded"
                );
                ProviderResult::succeeded(
                    self.id.clone(),
                    task_id,
                    response.text,
                    Usage::priced(response.usage, self.cost_per_1k_tokens),
                    latency_ms,
                )
            }
            Ok(Err(e)) => {
                let kind = FailureKind::from(&e);
                warn!(
                    provider = %self.id,
                    task_id = %task_id,
                    failure = kind.as_str(),
                    latency_ms,
                    "Provider call failed: {}",
                    e
                );
                ProviderResult::failed(self.id.clone(), task_id, kind, e.to_string(), latency_ms)
            }
            Err(_) => {
                warn!(
                    provider = %self.id,
                    task_id = %task_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Provider call timed out"
                );
                ProviderResult::timed_out(self.id.clone(), task_id, latency_ms)
            }
        }
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        self.provider.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{FinishReason, GenerationResponse, TokenUsage};

    struct SlowProvider(Duration);

    #[async_trait]
    impl LLMProvider for SlowProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            tokio::time::sleep(self.0).await;
            Ok(GenerationResponse {
                text: "done".into(),
                usage: TokenUsage {
                    prompt_tokens: 400,
                    completion_tokens: 600,
                    total_tokens: 1000,
                },
                provider: "slow".into(),
                model: "slow-1".into(),
                finish_reason: FinishReason::Stop,
            })
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    struct BrokenProvider;

    #[async_trait]
    impl LLMProvider for BrokenProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            Err(LLMError::ContentRejected("flagged".into()))
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Err(LLMError::Network("down".into()))
        }
    }

    fn adapter(provider: Arc<dyn LLMProvider>, timeout_ms: u64) -> VendorAdapter {
        VendorAdapter::new(
            ProviderId::new("vendor"),
            provider,
            Duration::from_millis(timeout_ms),
            0.002,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_priced() {
        let adapter = adapter(Arc::new(SlowProvider(Duration::from_millis(100))), 5000);
        let result = adapter
            .execute(&FinalPrompt::new("p"), &GenerationOptions::default(), TaskId::new())
            .await;
        assert!(result.is_success());
        assert_eq!(result.content(), Some("done"));
        assert!((result.usage().cost_usd - 0.002).abs() < 1e-12);
        assert!(result.latency_ms() >= 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_failed_result() {
        let adapter = adapter(Arc::new(SlowProvider(Duration::from_secs(60))), 5000);
        let result = adapter
            .execute(&FinalPrompt::new("p"), &GenerationOptions::default(), TaskId::new())
            .await;
        assert!(!result.is_success());
        assert_eq!(result.error_reason(), Some("timeout"));
        assert!((5000..5100).contains(&result.latency_ms()));
    }

    #[tokio::test]
    async fn test_errors_become_failed_result() {
        let adapter = adapter(Arc::new(BrokenProvider), 5000);
        let result = adapter
            .execute(&FinalPrompt::new("p"), &GenerationOptions::default(), TaskId::new())
            .await;
        assert_eq!(result.failure(), Some(FailureKind::ContentRejected));
        assert!(adapter.health_check().await.is_err());
    }
}
