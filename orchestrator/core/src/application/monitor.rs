// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Usage/Alert Monitor
//!
//! Append-only ledger of provider attempts. Serves per-caller quota queries
//! for the policy gate, window snapshots and threshold alerts for
//! `GET /monitor/status`, and forwards every record to a durable sink.
//!
//! Alongside the attempt ledger it keeps the admissions the gate granted
//! (request quota) and the rejections it issued (security statistics).
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** The only component aggregating usage across callers
//! - **Integration:** ProviderManager → UsageMonitor → UsageSink

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::llm::ProviderResult;
use crate::domain::node_config::MonitorConfig;
use crate::domain::policy::{CallerEvents, SecurityEvent, SecuritySeverity, SecurityStats};
use crate::domain::repository::UsageSink;
use crate::domain::task::{CallerId, ProviderId, Task, TaskId};
use crate::domain::usage::{
    Alert, AlertRule, AlertRules, CallerUsage, ProviderUsage, Threshold, UsageRecord,
    UsageSnapshot,
};

const RISK_CALLERS: usize = 10;

/// A task the gate let through, counted against the caller's request quota
struct Admission {
    caller_id: CallerId,
    task_id: TaskId,
    timestamp: DateTime<Utc>,
}

pub struct UsageMonitor {
    ledger: RwLock<Vec<UsageRecord>>,
    admissions: Mutex<Vec<Admission>>,
    security_events: RwLock<Vec<SecurityEvent>>,
    rules: AlertRules,
    retention: Duration,
    sink: Option<mpsc::Sender<UsageRecord>>,
}

fn cutoff(window: Duration) -> DateTime<Utc> {
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
    Utc::now()
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl UsageMonitor {
    /// Monitor without a durable sink
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            ledger: RwLock::new(Vec::new()),
            admissions: Mutex::new(Vec::new()),
            security_events: RwLock::new(Vec::new()),
            rules: config.alert_rules.clone(),
            retention: config.retention,
            sink: None,
        }
    }

    /// Monitor forwarding records to `sink` through a bounded channel.
    /// Returns the handle of the spawned sink writer.
    pub fn with_sink(
        config: &MonitorConfig,
        sink: Arc<dyn UsageSink>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.sink_buffer.max(1));
        let writer = SinkWriter {
            rx,
            sink,
            batch_size: config.sink_batch_size.max(1),
            flush_interval: config.sink_flush_interval,
            shutdown,
        };
        let handle = tokio::spawn(writer.run());

        let monitor = Self {
            sink: Some(tx),
            ..Self::new(config)
        };
        (monitor, handle)
    }

    /// Record one provider attempt, retries included
    pub fn record(&self, result: &ProviderResult, task: &Task) {
        let outcome = result.failure().map_or("success", |kind| kind.as_str());
        metrics::counter!(
            "ai_central_provider_attempts_total",
            "provider" => result.provider().to_string(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!(
            "ai_central_provider_latency_ms",
            "provider" => result.provider().to_string()
        )
        .record(result.latency_ms() as f64);

        self.record_usage(UsageRecord::from_attempt(result, task));
    }

    pub fn record_usage(&self, record: UsageRecord) {
        if let Some(tx) = &self.sink {
            if let Err(e) = tx.try_send(record.clone()) {
                warn!(
                    task_id = %record.task_id,
                    provider = %record.provider,
                    "Dropping usage record for durable sink: {}",
                    e
                );
            }
        }
        self.ledger.write().push(record);
    }

    /// Count the task against the caller's request quota unless `limit`
    /// admissions already fall inside `window`. Counting and recording
    /// happen under one lock. Returns the count in the window on refusal.
    pub fn admit(
        &self,
        caller: &CallerId,
        task_id: TaskId,
        window: Duration,
        limit: usize,
    ) -> Result<(), usize> {
        let since = cutoff(window);
        let mut admissions = self.admissions.lock();
        let admitted = admissions
            .iter()
            .filter(|a| &a.caller_id == caller && a.timestamp >= since)
            .count();
        if admitted >= limit {
            return Err(admitted);
        }
        admissions.push(Admission {
            caller_id: caller.clone(),
            task_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Admitted requests in `request_window` and tokens in `token_window`
    pub fn caller_usage(
        &self,
        caller: &CallerId,
        request_window: Duration,
        token_window: Duration,
    ) -> CallerUsage {
        let request_cutoff = cutoff(request_window);
        let token_cutoff = cutoff(token_window);

        let requests = self
            .admissions
            .lock()
            .iter()
            .filter(|a| &a.caller_id == caller && a.timestamp >= request_cutoff)
            .map(|a| a.task_id)
            .collect::<HashSet<_>>()
            .len();

        let tokens = self
            .ledger
            .read()
            .iter()
            .filter(|r| &r.caller_id == caller && r.timestamp >= token_cutoff)
            .map(|r| u64::from(r.tokens_used))
            .sum();

        CallerUsage { requests, tokens }
    }

    /// Tokens consumed by every caller since `since`
    pub fn tokens_since(&self, since: DateTime<Utc>) -> u64 {
        self.ledger
            .read()
            .iter()
            .filter(|r| r.timestamp >= since)
            .map(|r| u64::from(r.tokens_used))
            .sum()
    }

    pub fn record_security_event(&self, event: SecurityEvent) {
        if event.severity >= SecuritySeverity::High {
            warn!(
                caller_id = %event.caller_id,
                task_id = %event.task_id,
                check = event.check.as_str(),
                severity = ?event.severity,
                "High severity security event: {}",
                event.reason
            );
        }
        self.security_events.write().push(event);
    }

    pub fn security_stats(&self, window: Duration) -> SecurityStats {
        let since = cutoff(window);
        let events = self.security_events.read();

        let mut stats = SecurityStats::default();
        let mut per_caller: HashMap<&CallerId, usize> = HashMap::new();
        for event in events.iter().filter(|e| e.timestamp >= since) {
            stats.total_events += 1;
            *stats.by_check.entry(event.check).or_default() += 1;
            *stats.by_severity.entry(event.severity).or_default() += 1;
            if event.severity >= SecuritySeverity::Medium {
                *per_caller.entry(&event.caller_id).or_default() += 1;
            }
        }

        let mut risk_callers: Vec<CallerEvents> = per_caller
            .into_iter()
            .map(|(caller_id, events)| CallerEvents {
                caller_id: caller_id.clone(),
                events,
            })
            .collect();
        risk_callers.sort_by(|a, b| {
            b.events
                .cmp(&a.events)
                .then_with(|| a.caller_id.cmp(&b.caller_id))
        });
        risk_callers.truncate(RISK_CALLERS);
        stats.risk_callers = risk_callers;

        stats
    }

    pub fn snapshot(&self, window: Duration) -> UsageSnapshot {
        let since = cutoff(window);
        let ledger = self.ledger.read();

        let mut tasks = HashSet::new();
        let mut attempts = 0usize;
        let mut failures = 0usize;
        let mut latency_sum = 0u64;
        let mut total_tokens = 0u64;
        let mut total_cost = 0.0;
        let mut per_provider: BTreeMap<&ProviderId, (usize, usize, u64, u64, f64)> =
            BTreeMap::new();

        for record in ledger.iter().filter(|r| r.timestamp >= since) {
            tasks.insert(record.task_id);
            attempts += 1;
            latency_sum += record.latency_ms;
            total_tokens += u64::from(record.tokens_used);
            total_cost += record.cost_usd;
            if !record.success {
                failures += 1;
            }

            let entry = per_provider.entry(&record.provider).or_default();
            entry.0 += 1;
            if !record.success {
                entry.1 += 1;
            }
            entry.2 += record.latency_ms;
            entry.3 += u64::from(record.tokens_used);
            entry.4 += record.cost_usd;
        }

        let providers = per_provider
            .into_iter()
            .map(|(provider, (n, failed, latency, tokens, cost))| ProviderUsage {
                provider: provider.clone(),
                attempts: n,
                failures: failed,
                failure_rate: ratio(failed as f64, n),
                average_latency_ms: ratio(latency as f64, n),
                total_tokens: tokens,
                total_cost_usd: cost,
            })
            .collect();

        UsageSnapshot {
            window_seconds: window.as_secs(),
            requests: tasks.len(),
            attempts,
            failures,
            failure_rate: ratio(failures as f64, attempts),
            average_latency_ms: ratio(latency_sum as f64, attempts),
            total_tokens,
            total_cost_usd: total_cost,
            providers,
        }
    }

    /// Evaluate threshold rules over the window. Never mutates the ledger.
    pub fn check_alerts(&self, window: Duration) -> Vec<Alert> {
        self.alerts_for(&self.snapshot(window))
    }

    pub fn alerts_for(&self, snapshot: &UsageSnapshot) -> Vec<Alert> {
        let rules = &self.rules;
        let mut alerts = Vec::new();

        if snapshot.attempts >= rules.min_samples {
            push_alert(
                &mut alerts,
                AlertRule::FailureRate,
                &rules.failure_rate,
                snapshot.failure_rate,
                None,
                |observed| format!("{:.1}% of provider calls failed", observed * 100.0),
            );
            push_alert(
                &mut alerts,
                AlertRule::AverageLatency,
                &rules.average_latency_ms,
                snapshot.average_latency_ms,
                None,
                |observed| format!("average provider latency is {:.0} ms", observed),
            );
        }

        for provider in &snapshot.providers {
            if provider.attempts < rules.min_samples {
                continue;
            }
            push_alert(
                &mut alerts,
                AlertRule::ProviderFailureRate,
                &rules.provider_failure_rate,
                provider.failure_rate,
                Some(&provider.provider),
                |observed| {
                    format!(
                        "provider '{}' failed {:.1}% of calls",
                        provider.provider,
                        observed * 100.0
                    )
                },
            );
        }

        push_alert(
            &mut alerts,
            AlertRule::TokenBurn,
            &rules.token_burn,
            snapshot.total_tokens as f64,
            None,
            |observed| format!("{:.0} tokens consumed", observed),
        );

        for alert in &alerts {
            warn!(
                rule = ?alert.rule,
                severity = ?alert.severity,
                observed = alert.observed,
                threshold = alert.threshold,
                "{}",
                alert.message
            );
        }

        alerts
    }

    /// Drop records older than the retention period. Admissions and
    /// security events expire with them; only usage records are counted.
    pub fn prune(&self) -> usize {
        let since = cutoff(self.retention);
        self.admissions.lock().retain(|a| a.timestamp >= since);
        self.security_events.write().retain(|e| e.timestamp >= since);

        let mut ledger = self.ledger.write();
        let before = ledger.len();
        ledger.retain(|r| r.timestamp >= since);
        let pruned = before - ledger.len();
        if pruned > 0 {
            debug!(pruned, "Pruned usage records past retention");
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.ledger.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.read().is_empty()
    }
}

fn ratio(numerator: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        numerator / count as f64
    }
}

fn push_alert(
    alerts: &mut Vec<Alert>,
    rule: AlertRule,
    threshold: &Threshold,
    observed: f64,
    provider: Option<&ProviderId>,
    message: impl FnOnce(f64) -> String,
) {
    if let Some((severity, bound)) = threshold.classify(observed) {
        alerts.push(Alert {
            id: Uuid::new_v4(),
            rule,
            severity,
            message: message(observed),
            observed,
            threshold: bound,
            provider: provider.cloned(),
            raised_at: Utc::now(),
        });
    }
}

/// Batches records from the monitor channel into the durable sink
struct SinkWriter {
    rx: mpsc::Receiver<UsageRecord>,
    sink: Arc<dyn UsageSink>,
    batch_size: usize,
    flush_interval: Duration,
    shutdown: CancellationToken,
}

impl SinkWriter {
    async fn run(mut self) {
        info!(
            batch_size = self.batch_size,
            flush_interval_ms = self.flush_interval.as_millis() as u64,
            "Starting usage sink writer"
        );

        let mut buffer = Vec::with_capacity(self.batch_size);
        let mut tick = interval(self.flush_interval.max(Duration::from_millis(1)));

        loop {
            tokio::select! {
                received = self.rx.recv() => match received {
                    Some(record) => {
                        buffer.push(record);
                        if buffer.len() >= self.batch_size {
                            self.flush(&mut buffer).await;
                        }
                    }
                    None => break,
                },
                _ = tick.tick() => self.flush(&mut buffer).await,
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received, draining usage sink writer");
                    break;
                }
            }
        }

        while let Ok(record) = self.rx.try_recv() {
            buffer.push(record);
        }
        self.flush(&mut buffer).await;

        info!("Usage sink writer stopped");
    }

    async fn flush(&self, buffer: &mut Vec<UsageRecord>) {
        if buffer.is_empty() {
            return;
        }
        match self.sink.append(buffer).await {
            Ok(()) => debug!(records = buffer.len(), "Flushed usage records"),
            Err(e) => warn!(records = buffer.len(), "Failed to persist usage records: {}", e),
        }
        buffer.clear();
    }
}
