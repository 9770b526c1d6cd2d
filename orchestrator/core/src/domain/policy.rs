// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Policy
//!
//! Outcome types of the policy gate and the configuration it enforces.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Caller capabilities, quotas and content denylist

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::domain::task::{CallerId, ProviderId, Role, TaskId, TaskKind};

/// Which gate check produced a rejection. Checks run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyCheck {
    /// AI features switched off
    Disabled,
    Capability,
    PayloadSize,
    Quota,
    /// Global monthly token budget
    Budget,
    Denylist,
}

impl PolicyCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyCheck::Disabled => "disabled",
            PolicyCheck::Capability => "capability",
            PolicyCheck::PayloadSize => "payload_size",
            PolicyCheck::Quota => "quota",
            PolicyCheck::Budget => "budget",
            PolicyCheck::Denylist => "denylist",
        }
    }

    /// Severity of the security event recorded when this check rejects
    pub fn severity(&self) -> SecuritySeverity {
        match self {
            PolicyCheck::Disabled => SecuritySeverity::Low,
            PolicyCheck::Capability
            | PolicyCheck::PayloadSize
            | PolicyCheck::Quota
            | PolicyCheck::Budget => SecuritySeverity::Medium,
            PolicyCheck::Denylist => SecuritySeverity::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecuritySeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{reason}")]
pub struct PolicyRejection {
    pub check: PolicyCheck,
    pub reason: String,
}

impl PolicyRejection {
    pub fn new(check: PolicyCheck, reason: impl Into<String>) -> Self {
        Self {
            check,
            reason: reason.into(),
        }
    }
}

/// Security policy enforcement result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny(PolicyRejection),
}

impl PolicyDecision {
    pub fn allow(&self) -> bool {
        matches!(self, PolicyDecision::Allow)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            PolicyDecision::Allow => None,
            PolicyDecision::Deny(rejection) => Some(&rejection.reason),
        }
    }
}

impl fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyDecision::Allow => f.write_str("allow"),
            PolicyDecision::Deny(r) => write!(f, "deny ({}): {}", r.check.as_str(), r.reason),
        }
    }
}

/// A rejected task, kept by the monitor for security statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub caller_id: CallerId,
    pub task_id: TaskId,
    pub check: PolicyCheck,
    pub severity: SecuritySeverity,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn rejected(caller_id: CallerId, task_id: TaskId, rejection: &PolicyRejection) -> Self {
        Self {
            caller_id,
            task_id,
            check: rejection.check,
            severity: rejection.check.severity(),
            reason: rejection.reason.clone(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerEvents {
    pub caller_id: CallerId,
    pub events: usize,
}

/// Rejections over a window, as reported by `GET /monitor/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStats {
    pub total_events: usize,
    pub by_check: BTreeMap<PolicyCheck, usize>,
    pub by_severity: BTreeMap<SecuritySeverity, usize>,
    /// Callers with the most medium-or-worse events, most first
    pub risk_callers: Vec<CallerEvents>,
}

fn default_enabled() -> bool {
    true
}

fn default_role_capabilities() -> BTreeMap<Role, Vec<TaskKind>> {
    use TaskKind::*;
    let editor = vec![
        ContentGeneration,
        Analysis,
        Moderation,
        Summarization,
        Translation,
        SeoOptimization,
    ];
    BTreeMap::from([
        (Role::Admin, TaskKind::ALL.to_vec()),
        (Role::Editor, editor),
        (Role::User, vec![ContentGeneration, Summarization]),
    ])
}

fn default_fanout_roles() -> Vec<Role> {
    vec![Role::Admin]
}

fn default_provider_roles() -> BTreeMap<ProviderId, Vec<Role>> {
    let staff = vec![Role::Admin, Role::Editor];
    let admin = vec![Role::Admin];
    BTreeMap::from([
        (ProviderId::new("claude"), staff.clone()),
        (ProviderId::new("openai"), staff.clone()),
        (ProviderId::new("gemini"), staff),
        (ProviderId::new("llama"), admin.clone()),
        (ProviderId::new("cohere"), admin),
    ])
}

fn default_max_payload_bytes() -> usize {
    32 * 1024
}

fn default_request_window() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_max_requests() -> usize {
    100
}

fn default_token_window() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_max_tokens() -> u64 {
    50_000
}

fn default_denylist() -> Vec<String> {
    [
        r"\b(drop|alter|truncate)\s+table\b",
        r"\bdelete\s+from\b",
        r"\bgrant\s+all\b",
        r"\b(create|drop)\s+user\b",
        r"\b(eval|exec|system|popen|passthru|shell_exec)\s*\(",
        r"\b(private[_ ]key|api[_ ]key|credit[_ ]card|bank[_ ]account|social[_ ]security)\b",
        r"\b(generate\s+virus|create\s+malware|hack\s+into|ddos\s+attack|sql\s+injection|xss\s+attack)\b",
        r"(select|union|insert|update|delete|drop)\s+.*\b(from|into|table)\b",
        r"<script[^>]*>",
        r"javascript:\s*\S",
        r"\bon\w+\s*=\s*['\x22]",
        r"\$\{.*?\}",
        r"\{\{.*?\}\}",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Policy gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Master switch; when false every task is rejected
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Task kinds each role may submit
    #[serde(default = "default_role_capabilities")]
    pub role_capabilities: BTreeMap<Role, Vec<TaskKind>>,

    /// Roles allowed to fan a task out to more than one provider
    #[serde(default = "default_fanout_roles")]
    pub fanout_roles: Vec<Role>,

    /// Providers restricted to a subset of roles. Unlisted providers are
    /// open to every role.
    #[serde(default = "default_provider_roles")]
    pub provider_roles: BTreeMap<ProviderId, Vec<Role>>,

    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    #[serde(default = "default_request_window", with = "humantime_serde")]
    pub request_window: Duration,

    /// Distinct tasks a caller may run per request window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    #[serde(default = "default_token_window", with = "humantime_serde")]
    pub token_window: Duration,

    /// Tokens a caller may consume per token window
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,

    /// Tokens all callers together may consume per calendar month (UTC).
    /// Unset means no global budget.
    #[serde(default)]
    pub monthly_token_budget: Option<u64>,

    /// Case-insensitive regular expressions matched against instruction and
    /// context
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            role_capabilities: default_role_capabilities(),
            fanout_roles: default_fanout_roles(),
            provider_roles: default_provider_roles(),
            max_payload_bytes: default_max_payload_bytes(),
            request_window: default_request_window(),
            max_requests: default_max_requests(),
            token_window: default_token_window(),
            max_tokens: default_max_tokens(),
            monthly_token_budget: None,
            denylist: default_denylist(),
        }
    }
}
