// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provider Manager
//!
//! Dispatches a composed prompt to one or many provider adapters.
//!
//! - `execute_single` calls the only requested provider and retries once
//!   after a transport failure (timeout or network error).
//! - `execute_multiple` fans out to every requested provider concurrently and
//!   waits for all of them, then adds the comparison summary and, for
//!   moderation tasks, the consensus verdict.
//!
//! Neither operation fails: every provider outcome, including a panic inside
//! an adapter task, is reported as a `ProviderResult`.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::application::monitor::UsageMonitor;
use crate::domain::comparison::Comparison;
use crate::domain::consensus::{self, ConsensusConfig};
use crate::domain::llm::{
    AggregatedResult, FailureKind, FinalPrompt, ProviderAdapter, ProviderResult,
};
use crate::domain::task::{ProviderId, Task, TaskKind};
use crate::infrastructure::llm::AdapterSet;
use crate::infrastructure::prompt_composer::PromptComposer;

pub struct ProviderManager {
    adapters: AdapterSet,
    composer: Arc<PromptComposer>,
    monitor: Arc<UsageMonitor>,
    consensus: ConsensusConfig,
    retry_delay: Duration,
}

impl ProviderManager {
    pub fn new(
        adapters: AdapterSet,
        composer: Arc<PromptComposer>,
        monitor: Arc<UsageMonitor>,
        consensus: ConsensusConfig,
        retry_delay: Duration,
    ) -> Self {
        Self {
            adapters,
            composer,
            monitor,
            consensus,
            retry_delay,
        }
    }

    pub fn adapters(&self) -> &AdapterSet {
        &self.adapters
    }

    pub async fn execute_single(&self, task: &Task) -> ProviderResult {
        let prompt = Arc::new(self.composer.compose(task));

        let Some(provider) = task.providers.first() else {
            return ProviderResult::failed(
                ProviderId::new(""),
                task.id,
                FailureKind::NotConfigured,
                "no provider requested",
                0,
            );
        };
        let Some(adapter) = self.adapters.get(provider) else {
            let result = not_configured(provider, task);
            self.monitor.record(&result, task);
            return result;
        };

        let first = spawn_attempt(adapter.clone(), prompt.clone(), task)
            .await
            .unwrap_or_else(|join_error| aborted(provider, task, join_error));
        self.monitor.record(&first, task);

        match first.failure() {
            Some(kind) if kind.is_transport() => {
                warn!(
                    task_id = %task.id,
                    provider = %provider,
                    failure = kind.as_str(),
                    retry_delay_ms = self.retry_delay.as_millis() as u64,
                    "Transport failure, retrying once"
                );
                tokio::time::sleep(self.retry_delay).await;

                let second = spawn_attempt(adapter, prompt, task)
                    .await
                    .unwrap_or_else(|join_error| aborted(provider, task, join_error));
                self.monitor.record(&second, task);
                second
            }
            _ => first,
        }
    }

    pub async fn execute_multiple(&self, task: &Task) -> AggregatedResult {
        let prompt = Arc::new(self.composer.compose(task));

        info!(
            task_id = %task.id,
            providers = task.providers.len(),
            "Fanning out task"
        );

        let handles: Vec<_> = task
            .providers
            .iter()
            .map(|provider| {
                let handle = self
                    .adapters
                    .get(provider)
                    .map(|adapter| spawn_attempt(adapter, prompt.clone(), task));
                (provider, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (provider, handle) in handles {
            let result = match handle {
                Some(handle) => handle
                    .await
                    .unwrap_or_else(|join_error| aborted(provider, task, join_error)),
                None => not_configured(provider, task),
            };
            self.monitor.record(&result, task);
            results.push(result);
        }

        let comparison = task
            .compare_results
            .then(|| Comparison::from_results(&results));

        let (consensus, human_review) = if task.kind == TaskKind::Moderation {
            consensus::evaluate(&self.consensus, &results).into_parts()
        } else {
            (None, None)
        };

        debug!(
            task_id = %task.id,
            succeeded = results.iter().filter(|r| r.is_success()).count(),
            total = results.len(),
            "Fan-out complete"
        );

        AggregatedResult {
            task_id: task.id,
            results,
            comparison,
            consensus,
            human_review,
        }
    }
}

/// Runs one adapter call on its own task so a panic stays contained
fn spawn_attempt(
    adapter: Arc<dyn ProviderAdapter>,
    prompt: Arc<FinalPrompt>,
    task: &Task,
) -> JoinHandle<ProviderResult> {
    let options = task.options.clone();
    let task_id = task.id;
    tokio::spawn(async move { adapter.execute(&prompt, &options, task_id).await })
}

fn aborted(provider: &ProviderId, task: &Task, join_error: JoinError) -> ProviderResult {
    error!(
        task_id = %task.id,
        provider = %provider,
        "Provider task aborted: {}",
        join_error
    );
    ProviderResult::failed(
        provider.clone(),
        task.id,
        FailureKind::Internal,
        format!("provider task aborted: {}", join_error),
        0,
    )
}

fn not_configured(provider: &ProviderId, task: &Task) -> ProviderResult {
    warn!(task_id = %task.id, provider = %provider, "Provider is not configured");
    ProviderResult::failed(
        provider.clone(),
        task.id,
        FailureKind::NotConfigured,
        format!("provider '{}' is not configured", provider),
        0,
    )
}
