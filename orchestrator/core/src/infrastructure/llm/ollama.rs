// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama LLM Provider Adapter
//
// Anti-Corruption Layer for Ollama local models

use crate::domain::llm::{
    FinishReason, GenerationOptions, GenerationResponse, LLMError, LLMProvider, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct OllamaAdapter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
    eval_count: Option<u32>,
    prompt_eval_count: Option<u32>,
}

impl OllamaAdapter {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
        }
    }
}

#[async_trait]
impl LLMProvider for OllamaAdapter {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: Some(OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens.map(|t| t as i32),
                stop: options.stop_sequences.clone(),
            }),
        };

        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 404 {
                LLMError::ModelNotFound(self.model.clone())
            } else if status.is_server_error() {
                LLMError::Network(format!("HTTP {}: {}", status, error_text))
            } else {
                LLMError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let prompt_tokens = ollama_response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = ollama_response.eval_count.unwrap_or(0);

        Ok(GenerationResponse {
            text: ollama_response.response,
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            provider: "ollama".to_string(),
            model: self.model.clone(),
            finish_reason: if ollama_response.done {
                FinishReason::Stop
            } else {
                FinishReason::Length
            },
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        // Check if Ollama server is running by listing models
        let url = format!("{}/api/tags", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_counts_tokens() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_body(r#"{"response": "local answer", "done": true, "eval_count": 7, "prompt_eval_count": 20}"#)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "llama3.2".into());
        let response = adapter
            .generate("question", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(response.text, "local answer");
        assert_eq!(response.usage.total_tokens, 27);
    }

    #[tokio::test]
    async fn test_missing_model() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(404)
            .create_async()
            .await;

        let adapter = OllamaAdapter::new(server.url(), "nope".into());
        let err = adapter
            .generate("question", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LLMError::ModelNotFound(_)));
    }
}
