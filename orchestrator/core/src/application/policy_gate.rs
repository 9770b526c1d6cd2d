// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Gate
//!
//! Decides whether a caller may run a task, before anything is enqueued or
//! dispatched. A rejected task never reaches a provider adapter.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! | # | Check | Rejects when |
//! |---|-------|--------------|
//! | 1 | disabled | AI features are switched off |
//! | 2 | capability | role lacks the task kind, fan-out or a requested provider |
//! | 3 | payload size | instruction + context + metadata exceed the byte limit |
//! | 4 | quota | requests or tokens in the rolling windows reached their limit |
//! | 5 | budget | all callers together used up this month's token budget |
//! | 6 | denylist | instruction or context matches a configured pattern |
//!
//! An allowed task is counted against the caller's request quota at once,
//! whether it runs now or waits in the queue. Every rejection is kept by the
//! monitor as a security event.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use humantime_serde::re::humantime::format_duration;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::monitor::UsageMonitor;
use crate::domain::policy::{
    PolicyCheck, PolicyConfig, PolicyDecision, PolicyRejection, SecurityEvent,
};
use crate::domain::task::{Caller, Task};

pub struct PolicyGate {
    config: PolicyConfig,
    denylist: Vec<Regex>,
    monitor: Arc<UsageMonitor>,
}

impl PolicyGate {
    /// Fails when a denylist pattern is not a valid regular expression.
    pub fn new(config: PolicyConfig, monitor: Arc<UsageMonitor>) -> Result<Self> {
        let denylist = config
            .denylist
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("Invalid denylist pattern: {}", pattern))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(patterns = denylist.len(), "Policy gate initialized");

        Ok(Self {
            config,
            denylist,
            monitor,
        })
    }

    pub fn check(&self, task: &Task, caller: &Caller) -> PolicyDecision {
        let outcome = self
            .check_enabled()
            .and_then(|_| self.check_capability(task, caller))
            .and_then(|_| self.check_payload_size(task))
            .and_then(|_| self.check_quota(caller))
            .and_then(|_| self.check_budget())
            .and_then(|_| self.check_denylist(task))
            .and_then(|_| self.admit(task, caller));

        match outcome {
            Ok(()) => {
                debug!(task_id = %task.id, caller_id = %caller.id, "Policy gate allowed task");
                PolicyDecision::Allow
            }
            Err(rejection) => {
                metrics::counter!(
                    "ai_central_policy_rejections_total",
                    "check" => rejection.check.as_str()
                )
                .increment(1);
                info!(
                    task_id = %task.id,
                    caller_id = %caller.id,
                    check = rejection.check.as_str(),
                    "Policy gate rejected task: {}",
                    rejection.reason
                );
                self.monitor.record_security_event(SecurityEvent::rejected(
                    caller.id.clone(),
                    task.id,
                    &rejection,
                ));
                PolicyDecision::Deny(rejection)
            }
        }
    }

    fn check_enabled(&self) -> Result<(), PolicyRejection> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(PolicyRejection::new(
                PolicyCheck::Disabled,
                "AI features are disabled",
            ))
        }
    }

    fn check_capability(&self, task: &Task, caller: &Caller) -> Result<(), PolicyRejection> {
        let allowed_kinds = self
            .config
            .role_capabilities
            .get(&caller.role)
            .map(Vec::as_slice)
            .unwrap_or_default();

        if !allowed_kinds.contains(&task.kind) {
            return Err(PolicyRejection::new(
                PolicyCheck::Capability,
                format!(
                    "role '{}' may not submit {} tasks",
                    caller.role,
                    task.kind.as_str()
                ),
            ));
        }

        if task.is_fan_out() && !self.config.fanout_roles.contains(&caller.role) {
            return Err(PolicyRejection::new(
                PolicyCheck::Capability,
                format!(
                    "role '{}' may not fan a task out to multiple providers",
                    caller.role
                ),
            ));
        }

        for provider in &task.providers {
            if let Some(roles) = self.config.provider_roles.get(provider) {
                if !roles.contains(&caller.role) {
                    return Err(PolicyRejection::new(
                        PolicyCheck::Capability,
                        format!("role '{}' may not use provider '{}'", caller.role, provider),
                    ));
                }
            }
        }

        Ok(())
    }

    fn check_payload_size(&self, task: &Task) -> Result<(), PolicyRejection> {
        let size = task.payload.size_bytes();
        if size > self.config.max_payload_bytes {
            return Err(PolicyRejection::new(
                PolicyCheck::PayloadSize,
                format!(
                    "payload is {} bytes, limit is {} bytes",
                    size, self.config.max_payload_bytes
                ),
            ));
        }
        Ok(())
    }

    fn check_quota(&self, caller: &Caller) -> Result<(), PolicyRejection> {
        let usage = self.monitor.caller_usage(
            &caller.id,
            self.config.request_window,
            self.config.token_window,
        );

        if usage.requests >= self.config.max_requests {
            return Err(self.request_quota_exceeded(usage.requests));
        }

        if usage.tokens >= self.config.max_tokens {
            return Err(PolicyRejection::new(
                PolicyCheck::Quota,
                format!(
                    "token quota exceeded: {} of {} tokens used in the last {}",
                    usage.tokens,
                    self.config.max_tokens,
                    format_duration(self.config.token_window)
                ),
            ));
        }

        Ok(())
    }

    fn request_quota_exceeded(&self, used: usize) -> PolicyRejection {
        PolicyRejection::new(
            PolicyCheck::Quota,
            format!(
                "request quota exceeded: {} of {} requests used in the last {}",
                used,
                self.config.max_requests,
                format_duration(self.config.request_window)
            ),
        )
    }

    fn check_budget(&self) -> Result<(), PolicyRejection> {
        let Some(budget) = self.config.monthly_token_budget else {
            return Ok(());
        };
        let used = self.monitor.tokens_since(month_start(Utc::now()));
        if used >= budget {
            return Err(PolicyRejection::new(
                PolicyCheck::Budget,
                format!(
                    "monthly token budget exhausted: {} of {} tokens used",
                    used, budget
                ),
            ));
        }
        Ok(())
    }

    /// Counting happens under the monitor's lock, so concurrent submissions
    /// cannot both take the last slot.
    fn admit(&self, task: &Task, caller: &Caller) -> Result<(), PolicyRejection> {
        self.monitor
            .admit(
                &caller.id,
                task.id,
                self.config.request_window,
                self.config.max_requests,
            )
            .map_err(|used| self.request_quota_exceeded(used))
    }

    fn check_denylist(&self, task: &Task) -> Result<(), PolicyRejection> {
        let texts = std::iter::once(task.payload.instruction.as_str())
            .chain(task.payload.context.as_deref());

        for text in texts {
            if let Some(pattern) = self.denylist.iter().find(|re| re.is_match(text)) {
                debug!(task_id = %task.id, pattern = pattern.as_str(), "Denylist match");
                return Err(PolicyRejection::new(
                    PolicyCheck::Denylist,
                    "content matches a denied pattern",
                ));
            }
        }

        Ok(())
    }
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::GenerationOptions;
    use crate::domain::node_config::MonitorConfig;
    use crate::domain::task::{CallerId, DispatchMode, ProviderId, Role, TaskId, TaskKind, TaskRequest};
    use crate::domain::usage::UsageRecord;
    use chrono::Utc;
    use std::time::Duration;

    fn caller(role: Role) -> Caller {
        Caller {
            id: CallerId::new("caller-1"),
            role,
        }
    }

    fn task(kind: &str, providers: &[&str], instruction: &str) -> Task {
        let dispatch = if providers.len() > 1 {
            DispatchMode::Multi
        } else {
            DispatchMode::Single
        };
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
        .into_task(CallerId::new("caller-1"), dispatch, &GenerationOptions::default())
        .unwrap()
    }

    fn gate(config: PolicyConfig) -> (PolicyGate, Arc<UsageMonitor>) {
        let monitor = Arc::new(UsageMonitor::new(&MonitorConfig::default()));
        (PolicyGate::new(config, monitor.clone()).unwrap(), monitor)
    }

    fn rejected_by(decision: PolicyDecision) -> Option<PolicyCheck> {
        match decision {
            PolicyDecision::Allow => None,
            PolicyDecision::Deny(rejection) => Some(rejection.check),
        }
    }

    #[test]
    fn test_capability_by_role() {
        let (gate, _) = gate(PolicyConfig::default());

        let summary = task("summarization", &["openai"], "Summarise the article");
        assert!(gate.check(&summary, &caller(Role::Editor)).allow());
        // Users may summarise, but openai is restricted to staff
        assert_eq!(
            rejected_by(gate.check(&summary, &caller(Role::User))),
            Some(PolicyCheck::Capability)
        );

        let trends = task("trend-analysis", &["mock"], "What is trending?");
        assert_eq!(
            rejected_by(gate.check(&trends, &caller(Role::Editor))),
            Some(PolicyCheck::Capability)
        );
        assert!(gate.check(&trends, &caller(Role::Admin)).allow());
    }

    #[test]
    fn test_fan_out_requires_admin() {
        let (gate, _) = gate(PolicyConfig::default());
        let fan_out = task("analysis", &["openai", "claude"], "Compare these drafts");
        assert!(gate.check(&fan_out, &caller(Role::Admin)).allow());

        let decision = gate.check(&fan_out, &caller(Role::Editor));
        assert!(decision.reason().unwrap().contains("multiple providers"));
    }

    #[test]
    fn test_payload_size_limit() {
        let (gate, _) = gate(PolicyConfig {
            max_payload_bytes: 16,
            ..PolicyConfig::default()
        });
        let big = task("analysis", &["mock"], "This instruction is longer than sixteen bytes");
        assert_eq!(
            rejected_by(gate.check(&big, &caller(Role::Admin))),
            Some(PolicyCheck::PayloadSize)
        );
    }

    fn usage(caller: &Caller, tokens: u32) -> UsageRecord {
        UsageRecord {
            caller_id: caller.id.clone(),
            task_id: TaskId::new(),
            provider: ProviderId::new("mock"),
            kind: TaskKind::Analysis,
            success: true,
            tokens_used: tokens,
            cost_usd: 0.0,
            latency_ms: 10,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_allowed_tasks_count_against_request_quota() {
        let (gate, monitor) = gate(PolicyConfig {
            max_requests: 2,
            ..PolicyConfig::default()
        });
        let admin = caller(Role::Admin);

        // No provider attempt has been recorded for any of these
        assert!(gate.check(&task("analysis", &["mock"], "Analyse"), &admin).allow());
        assert!(gate.check(&task("analysis", &["mock"], "Analyse"), &admin).allow());
        assert!(monitor.is_empty());

        let decision = gate.check(&task("analysis", &["mock"], "Analyse"), &admin);
        assert_eq!(rejected_by(decision.clone()), Some(PolicyCheck::Quota));
        assert!(decision.reason().unwrap().starts_with("request quota exceeded: 2 of 2"));
    }

    #[test]
    fn test_rejected_tasks_do_not_consume_quota() {
        let (gate, _) = gate(PolicyConfig {
            max_requests: 1,
            ..PolicyConfig::default()
        });
        let admin = caller(Role::Admin);

        let denied = task("analysis", &["mock"], "drop table users");
        assert_eq!(rejected_by(gate.check(&denied, &admin)), Some(PolicyCheck::Denylist));
        assert!(gate.check(&task("analysis", &["mock"], "Analyse"), &admin).allow());
    }

    #[test]
    fn test_token_quota() {
        let (gate, monitor) = gate(PolicyConfig {
            max_tokens: 1000,
            ..PolicyConfig::default()
        });
        let admin = caller(Role::Admin);
        let next = task("analysis", &["mock"], "Analyse");

        monitor.record_usage(usage(&admin, 999));
        assert!(gate.check(&next, &admin).allow());

        monitor.record_usage(usage(&admin, 1));
        assert!(gate
            .check(&next, &admin)
            .reason()
            .unwrap()
            .starts_with("token quota exceeded"));
    }

    #[test]
    fn test_token_window_excludes_old_usage() {
        let (gate, monitor) = gate(PolicyConfig {
            max_tokens: 100,
            token_window: Duration::from_secs(60),
            ..PolicyConfig::default()
        });
        let admin = caller(Role::Admin);
        monitor.record_usage(UsageRecord {
            timestamp: Utc::now() - chrono::Duration::minutes(5),
            ..usage(&admin, 5000)
        });
        assert!(gate.check(&task("analysis", &["mock"], "Analyse"), &admin).allow());
    }

    #[test]
    fn test_disabled_rejects_everything() {
        let (gate, _) = gate(PolicyConfig {
            enabled: false,
            ..PolicyConfig::default()
        });
        let decision = gate.check(&task("analysis", &["mock"], "Analyse"), &caller(Role::Admin));
        assert_eq!(rejected_by(decision.clone()), Some(PolicyCheck::Disabled));
        assert_eq!(decision.reason(), Some("AI features are disabled"));
    }

    #[test]
    fn test_monthly_budget_spans_callers() {
        let (gate, monitor) = gate(PolicyConfig {
            monthly_token_budget: Some(1000),
            ..PolicyConfig::default()
        });
        let admin = caller(Role::Admin);
        let other = Caller {
            id: CallerId::new("caller-2"),
            role: Role::Admin,
        };

        monitor.record_usage(usage(&other, 600));
        assert!(gate.check(&task("analysis", &["mock"], "Analyse"), &admin).allow());

        monitor.record_usage(usage(&other, 400));
        let decision = gate.check(&task("analysis", &["mock"], "Analyse"), &admin);
        assert_eq!(rejected_by(decision.clone()), Some(PolicyCheck::Budget));
        assert!(decision.reason().unwrap().contains("1000 of 1000"));
    }

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2026, 3, 17, 14, 5, 9).unwrap();
        assert_eq!(
            month_start(now),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rejections_are_recorded_as_security_events() {
        let (gate, monitor) = gate(PolicyConfig::default());
        let user = caller(Role::User);
        gate.check(&task("analysis", &["mock"], "Analyse"), &user);
        gate.check(&task("summarization", &["mock"], "<script>alert(1)</script>"), &user);
        assert!(gate.check(&task("summarization", &["mock"], "Summarise"), &user).allow());

        let stats = monitor.security_stats(Duration::from_secs(60));
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.by_check[&PolicyCheck::Capability], 1);
        assert_eq!(stats.by_check[&PolicyCheck::Denylist], 1);
        assert_eq!(stats.risk_callers[0].caller_id, user.id);
        assert_eq!(stats.risk_callers[0].events, 2);
    }

    #[test]
    fn test_denylist_is_case_insensitive() {
        let (gate, _) = gate(PolicyConfig::default());
        let admin = caller(Role::Admin);
        let bad = task("analysis", &["mock"], "Please DROP TABLE users");
        assert_eq!(rejected_by(gate.check(&bad, &admin)), Some(PolicyCheck::Denylist));

        let script = task("analysis", &["mock"], "Embed <SCRIPT src=x> here");
        assert_eq!(rejected_by(gate.check(&script, &admin)), Some(PolicyCheck::Denylist));
    }

    #[test]
    fn test_checks_short_circuit_in_order() {
        let (gate, _) = gate(PolicyConfig {
            max_payload_bytes: 4,
            ..PolicyConfig::default()
        });
        // Both capability and payload size fail; capability is reported
        let bad = task("monitoring", &["mock"], "drop table users");
        assert_eq!(
            rejected_by(gate.check(&bad, &caller(Role::User))),
            Some(PolicyCheck::Capability)
        );
    }

    #[test]
    fn test_invalid_denylist_pattern_fails_construction() {
        let monitor = Arc::new(UsageMonitor::new(&MonitorConfig::default()));
        let config = PolicyConfig {
            denylist: vec!["(unclosed".to_string()],
            ..PolicyConfig::default()
        };
        assert!(PolicyGate::new(config, monitor).is_err());
    }
}
