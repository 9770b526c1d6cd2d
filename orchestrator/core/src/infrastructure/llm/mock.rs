// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Mock LLM Provider
//
// Deterministic offline provider for development and demos. Sleeps for the
// configured latency, then echoes the prompt or returns a fixed response.
// Prompts asking for a moderation verdict get a well-formed approval.

use crate::domain::llm::{
    FinishReason, GenerationOptions, GenerationResponse, LLMError, LLMProvider, TokenUsage,
};
use async_trait::async_trait;
use std::time::Duration;

const ECHO_PREVIEW_CHARS: usize = 200;

pub struct MockAdapter {
    latency: Duration,
    response: Option<String>,
}

impl MockAdapter {
    pub fn new(latency: Duration, response: Option<String>) -> Self {
        Self { latency, response }
    }
}

fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[async_trait]
impl LLMProvider for MockAdapter {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let text = match &self.response {
            Some(fixed) => fixed.clone(),
            None if prompt.contains("\"approved\"") => {
                r#"{"approved": true, "confidence": 0.6, "reasons": ["mock provider approves everything"]}"#
                    .to_string()
            }
            None => {
                let last_line = prompt.lines().last().unwrap_or_default();
                let preview: String = last_line.chars().take(ECHO_PREVIEW_CHARS).collect();
                format!("[mock] {}", preview)
            }
        };

        let prompt_tokens = word_count(prompt);
        let completion_tokens = word_count(&text);
        Ok(GenerationResponse {
            text,
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            provider: "mock".to_string(),
            model: "mock-1".to_string(),
            finish_reason: FinishReason::Stop,
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_echoes_last_line_after_latency() {
        let adapter = MockAdapter::new(Duration::from_millis(250), None);
        let started = tokio::time::Instant::now();
        let response = adapter
            .generate("rules\nWrite a haiku", &GenerationOptions::default())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert_eq!(response.text, "[mock] Write a haiku");
        assert_eq!(response.usage.prompt_tokens, 4);
    }

    #[tokio::test]
    async fn test_moderation_prompt_gets_verdict() {
        let adapter = MockAdapter::new(Duration::ZERO, None);
        let response = adapter
            .generate(r#"Respond with {"approved": bool}"#, &GenerationOptions::default())
            .await
            .unwrap();
        assert!(response.text.contains("\"approved\": true"));
    }
}
