// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Anthropic LLM Provider Adapter
//
// Anti-Corruption Layer for Anthropic Claude API

use crate::domain::llm::{
    FinishReason, GenerationOptions, GenerationResponse, LLMError, LLMProvider, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: AnthropicUsage,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicAdapter {
    /// An empty endpoint selects the public Anthropic API.
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        let endpoint = if endpoint.is_empty() {
            DEFAULT_ENDPOINT.to_string()
        } else {
            endpoint
        };
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/messages", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl LLMProvider for AnthropicAdapter {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: options.max_tokens.unwrap_or(4096),
            temperature: options.temperature,
            stop_sequences: options.stop_sequences.clone(),
        };

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 401 || status == 403 {
                LLMError::Authentication(error_text)
            } else if status == 429 {
                LLMError::RateLimit
            } else if status == 404 {
                LLMError::ModelNotFound(self.model.clone())
            } else if status.is_server_error() {
                LLMError::Network(format!("HTTP {}: {}", status, error_text))
            } else {
                LLMError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let finish_reason = match anthropic_response.stop_reason.as_deref() {
            Some("max_tokens") => FinishReason::Length,
            Some("refusal") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };
        if finish_reason == FinishReason::ContentFilter {
            return Err(LLMError::ContentRejected("model refused the request".into()));
        }

        let text = anthropic_response
            .content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        let usage = &anthropic_response.usage;
        Ok(GenerationResponse {
            text,
            usage: TokenUsage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage.input_tokens + usage.output_tokens,
            },
            provider: "anthropic".to_string(),
            model: self.model.clone(),
            finish_reason,
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        // Anthropic has no cheap ping; a GET on the messages endpoint checks auth
        let response = self
            .client
            .get(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        // 405 Method Not Allowed is expected (GET not supported), but it means auth is valid
        if response.status().is_success()
            || response.status() == 404
            || response.status() == 405
        {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(LLMError::Authentication("Invalid API key".into()))
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}
