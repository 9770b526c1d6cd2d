// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Provider-facing domain interfaces and the result types produced by them.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary between orchestration and vendor APIs

// LLM Provider Domain Interface (Anti-Corruption Layer)
//
// Two levels of abstraction live here:
// - `LLMProvider` is the raw vendor client (OpenAI, Anthropic, Ollama, ...).
//   It returns `Result` and knows nothing about tasks.
// - `ProviderAdapter` is what orchestration talks to. It never errors: every
//   outcome, including timeouts, is folded into a `ProviderResult`.
//
// Implementations in infrastructure/llm/ directory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::comparison::Comparison;
use crate::domain::consensus::{HumanReview, ModerationConsensus};
use crate::domain::task::{ProviderId, TaskId};

/// Domain interface for LLM providers
/// Anti-Corruption Layer that isolates business logic from vendor APIs
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the LLM
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError>;

    /// Check if provider is healthy and accessible
    async fn health_check(&self) -> Result<(), LLMError>;
}

/// Options for LLM generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,

    /// Sequences that stop generation
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(4096),
            temperature: Some(0.7),
            stop_sequences: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// Generated text
    pub text: String,

    /// Token usage stats
    pub usage: TokenUsage,

    /// Usage provider name (e.g., "openai", "ollama")
    pub provider: String,

    /// Model used (e.g., "gpt-4o", "llama3.2")
    pub model: String,

    /// Why generation stopped
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason why generation stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural completion (model decided to stop)
    Stop,

    /// Hit max_tokens limit
    Length,

    /// Blocked by content filter
    ContentFilter,
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Content rejected by provider: {0}")]
    ContentRejected(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Provider-ready prompt produced by the prompt composer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FinalPrompt(String);

impl FinalPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Why a provider attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Transport,
    RateLimited,
    Authentication,
    ContentRejected,
    ProviderError,
    NotConfigured,
    Internal,
}

impl FailureKind {
    /// Transport-level failures are the only ones worth a retry.
    pub fn is_transport(&self) -> bool {
        matches!(self, FailureKind::Timeout | FailureKind::Transport)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Transport => "transport",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Authentication => "authentication",
            FailureKind::ContentRejected => "content_rejected",
            FailureKind::ProviderError => "provider_error",
            FailureKind::NotConfigured => "not_configured",
            FailureKind::Internal => "internal",
        }
    }
}

impl From<&LLMError> for FailureKind {
    fn from(err: &LLMError) -> Self {
        match err {
            LLMError::Network(_) => FailureKind::Transport,
            LLMError::Authentication(_) => FailureKind::Authentication,
            LLMError::RateLimit => FailureKind::RateLimited,
            LLMError::ContentRejected(_) => FailureKind::ContentRejected,
            LLMError::ModelNotFound(_) | LLMError::Provider(_) | LLMError::InvalidInput(_) => {
                FailureKind::ProviderError
            }
        }
    }
}

/// Token and cost accounting for a single attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_usd: f64,
}

impl Usage {
    pub fn priced(tokens: TokenUsage, cost_per_1k_tokens: f64) -> Self {
        Self {
            prompt_tokens: tokens.prompt_tokens,
            completion_tokens: tokens.completion_tokens,
            total_tokens: tokens.total_tokens,
            cost_usd: tokens.total_tokens as f64 / 1000.0 * cost_per_1k_tokens,
        }
    }
}

/// Outcome of one adapter call.
///
/// Fields are private: the constructors guarantee that `content` is present
/// exactly when the attempt succeeded and `error_reason` exactly when it
/// failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    provider: ProviderId,
    task_id: TaskId,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    usage: Usage,
    latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureKind>,
}

impl ProviderResult {
    pub fn succeeded(
        provider: ProviderId,
        task_id: TaskId,
        content: String,
        usage: Usage,
        latency_ms: u64,
    ) -> Self {
        Self {
            provider,
            task_id,
            success: true,
            content: Some(content),
            usage,
            latency_ms,
            error_reason: None,
            failure: None,
        }
    }

    pub fn failed(
        provider: ProviderId,
        task_id: TaskId,
        failure: FailureKind,
        reason: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            provider,
            task_id,
            success: false,
            content: None,
            usage: Usage::default(),
            latency_ms,
            error_reason: Some(reason.into()),
            failure: Some(failure),
        }
    }

    /// The error reason is exactly `"timeout"` so callers can match on it.
    pub fn timed_out(provider: ProviderId, task_id: TaskId, latency_ms: u64) -> Self {
        Self::failed(provider, task_id, FailureKind::Timeout, "timeout", latency_ms)
    }

    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    pub fn error_reason(&self) -> Option<&str> {
        self.error_reason.as_deref()
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }
}

/// Uniform contract every vendor adapter exposes to the provider manager.
///
/// Implementations must enforce their own timeout and must never panic or
/// return early without a result: all failure modes become a failed
/// [`ProviderResult`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> &ProviderId;

    async fn execute(
        &self,
        prompt: &FinalPrompt,
        options: &GenerationOptions,
        task_id: TaskId,
    ) -> ProviderResult;

    /// Reachability check; adapters without one report healthy.
    async fn health_check(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

/// Result of a task as seen by the caller.
///
/// `results` holds one entry per requested provider, in request order,
/// whether or not that provider succeeded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub task_id: TaskId,
    pub results: Vec<ProviderResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus: Option<ModerationConsensus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_review: Option<HumanReview>,
}

impl AggregatedResult {
    pub fn from_single(result: ProviderResult) -> Self {
        Self {
            task_id: result.task_id(),
            results: vec![result],
            comparison: None,
            consensus: None,
            human_review: None,
        }
    }

    pub fn successful(&self) -> impl Iterator<Item = &ProviderResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn all_failed(&self) -> bool {
        self.results.iter().all(|r| !r.is_success())
    }
}
