// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Usage accounting and alerting value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::llm::ProviderResult;
use crate::domain::task::{CallerId, ProviderId, Task, TaskId, TaskKind};

/// One row per provider attempt, retries included. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub caller_id: CallerId,
    pub task_id: TaskId,
    pub provider: ProviderId,
    pub kind: TaskKind,
    pub success: bool,
    pub tokens_used: u32,
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    pub fn from_attempt(result: &ProviderResult, task: &Task) -> Self {
        Self {
            caller_id: task.caller_id.clone(),
            task_id: task.id,
            provider: result.provider().clone(),
            kind: task.kind,
            success: result.is_success(),
            tokens_used: result.usage().total_tokens,
            cost_usd: result.usage().cost_usd,
            latency_ms: result.latency_ms(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertRule {
    FailureRate,
    AverageLatency,
    ProviderFailureRate,
    TokenBurn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub warning: f64,
    pub critical: f64,
}

impl Threshold {
    pub const fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }

    /// Severity for an observed value, if it crosses either bound.
    pub fn classify(&self, observed: f64) -> Option<(AlertSeverity, f64)> {
        if observed > self.critical {
            Some((AlertSeverity::Critical, self.critical))
        } else if observed > self.warning {
            Some((AlertSeverity::Warning, self.warning))
        } else {
            None
        }
    }
}

fn default_failure_rate() -> Threshold {
    Threshold::new(0.05, 0.20)
}

fn default_latency() -> Threshold {
    Threshold::new(3000.0, 5000.0)
}

fn default_provider_failure_rate() -> Threshold {
    Threshold::new(0.10, 0.50)
}

fn default_token_burn() -> Threshold {
    Threshold::new(100_000.0, 250_000.0)
}

fn default_min_samples() -> usize {
    5
}

/// Threshold rules evaluated by the usage monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRules {
    /// Overall failed attempts / attempts
    #[serde(default = "default_failure_rate")]
    pub failure_rate: Threshold,

    /// Mean latency of all attempts in milliseconds
    #[serde(default = "default_latency")]
    pub average_latency_ms: Threshold,

    /// Failure rate of a single provider
    #[serde(default = "default_provider_failure_rate")]
    pub provider_failure_rate: Threshold,

    /// Tokens consumed across all callers in the window
    #[serde(default = "default_token_burn")]
    pub token_burn: Threshold,

    /// Rate rules stay silent below this many attempts
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            failure_rate: default_failure_rate(),
            average_latency_ms: default_latency(),
            provider_failure_rate: default_provider_failure_rate(),
            token_burn: default_token_burn(),
            min_samples: default_min_samples(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub rule: AlertRule,
    pub severity: AlertSeverity,
    pub message: String,
    pub observed: f64,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUsage {
    pub provider: ProviderId,
    pub attempts: usize,
    pub failures: usize,
    pub failure_rate: f64,
    pub average_latency_ms: f64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
}

/// Aggregates over a time window, across all callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub window_seconds: u64,
    /// Distinct tasks that made at least one attempt
    pub requests: usize,
    pub attempts: usize,
    pub failures: usize,
    pub failure_rate: f64,
    pub average_latency_ms: f64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub providers: Vec<ProviderUsage>,
}

/// Per-caller consumption consulted by the policy gate's quota check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallerUsage {
    pub requests: usize,
    pub tokens: u64,
}
