// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures for the integration tests: a scripted provider adapter and
//! a fully wired task service backed by in-memory collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use central_core::application::{
    JobQueue, PolicyGate, ProviderManager, TaskService, UsageMonitor,
};
use central_core::domain::consensus::ConsensusConfig;
use central_core::domain::llm::{
    FailureKind, FinalPrompt, GenerationOptions, ProviderAdapter, ProviderResult, Usage,
};
use central_core::domain::node_config::{MonitorConfig, PromptConfig};
use central_core::domain::policy::PolicyConfig;
use central_core::domain::task::{Caller, CallerId, ProviderId, Role, TaskId, TaskRequest};
use central_core::infrastructure::llm::AdapterSet;
use central_core::infrastructure::repositories::StaticCallerDirectory;
use central_core::infrastructure::PromptComposer;

/// Answers after a fixed latency with either a fixed text or a failure.
pub struct ScriptedProvider {
    id: ProviderId,
    latency: Duration,
    reply: Result<String, FailureKind>,
    tokens: u32,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn replying(id: &str, latency_ms: u64, text: &str) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::new(id),
            latency: Duration::from_millis(latency_ms),
            reply: Ok(text.to_string()),
            tokens: 100,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(id: &str, latency_ms: u64, kind: FailureKind) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::new(id),
            latency: Duration::from_millis(latency_ms),
            reply: Err(kind),
            tokens: 0,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn execute(
        &self,
        _prompt: &FinalPrompt,
        _options: &GenerationOptions,
        task_id: TaskId,
    ) -> ProviderResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        let latency_ms = self.latency.as_millis() as u64;
        match &self.reply {
            Ok(text) => ProviderResult::succeeded(
                self.id.clone(),
                task_id,
                text.clone(),
                Usage {
                    prompt_tokens: self.tokens / 2,
                    completion_tokens: self.tokens / 2,
                    total_tokens: self.tokens,
                    cost_usd: 0.0,
                },
                latency_ms,
            ),
            Err(kind) => {
                ProviderResult::failed(self.id.clone(), task_id, *kind, kind.as_str(), latency_ms)
            }
        }
    }
}

pub fn caller(id: &str, role: Role) -> Caller {
    Caller {
        id: CallerId::new(id),
        role,
    }
}

pub fn default_callers() -> Vec<Caller> {
    vec![
        caller("root", Role::Admin),
        caller("ed", Role::Editor),
        caller("usr", Role::User),
    ]
}

pub fn request(kind: &str, providers: &[&str], instruction: &str) -> TaskRequest {
    TaskRequest {
        kind: kind.to_string(),
        providers: providers.iter().map(|p| p.to_string()).collect(),
        instruction: instruction.to_string(),
        context: None,
        metadata: Default::default(),
        priority: None,
        mode: Default::default(),
        compare_results: false,
        max_tokens: None,
        temperature: None,
    }
}

pub struct Harness {
    pub service: Arc<TaskService>,
    pub queue: Arc<JobQueue>,
    pub monitor: Arc<UsageMonitor>,
}

pub struct HarnessBuilder {
    adapters: AdapterSet,
    policy: PolicyConfig,
    consensus: ConsensusConfig,
    callers: Vec<Caller>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            adapters: AdapterSet::new(),
            // Open provider access so scripted ids are not role-restricted
            policy: PolicyConfig {
                provider_roles: Default::default(),
                ..PolicyConfig::default()
            },
            consensus: ConsensusConfig::default(),
            callers: default_callers(),
        }
    }

    pub fn adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter);
        self
    }

    pub fn policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn consensus(mut self, consensus: ConsensusConfig) -> Self {
        self.consensus = consensus;
        self
    }

    pub fn build(self) -> Harness {
        let monitor = Arc::new(UsageMonitor::new(&MonitorConfig::default()));
        let composer = Arc::new(PromptComposer::new(&PromptConfig::default()).unwrap());
        let manager = Arc::new(ProviderManager::new(
            self.adapters,
            composer,
            monitor.clone(),
            self.consensus,
            Duration::from_millis(500),
        ));
        let gate = Arc::new(PolicyGate::new(self.policy, monitor.clone()).unwrap());
        let queue = Arc::new(JobQueue::new());
        let service = Arc::new(TaskService::new(
            manager,
            gate,
            queue.clone(),
            monitor.clone(),
            Arc::new(StaticCallerDirectory::new(self.callers)),
            GenerationOptions::default(),
            Duration::from_secs(3600),
        ));
        Harness {
            service,
            queue,
            monitor,
        }
    }
}
