// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Service
//!
//! Entry point for every task submission, shared by the HTTP API and the
//! worker pool.
//!
//! ```text
//! request ─▶ validate ─▶ policy gate ─┬─ sync  ─▶ ProviderManager ─▶ result
//!                                     └─ async ─▶ JobQueue ─▶ WorkerPool ─▶ ProviderManager
//! ```
//!
//! Only validation and policy rejections short-circuit a submission; provider
//! failures are always reported inside the result.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

use crate::application::job_queue::JobQueue;
use crate::application::monitor::UsageMonitor;
use crate::application::policy_gate::PolicyGate;
use crate::application::provider_manager::ProviderManager;
use crate::application::worker::JobExecutor;
use crate::domain::job::{JobError, JobId, JobStatus};
use crate::domain::llm::{AggregatedResult, GenerationOptions, ProviderResult};
use crate::domain::policy::{PolicyDecision, PolicyRejection, SecurityStats};
use crate::domain::repository::{CallerDirectory, RepositoryError};
use crate::domain::task::{
    Caller, CallerId, DispatchMode, ExecutionMode, ProviderId, Role, Task, TaskRequest,
    ValidationError,
};
use crate::domain::usage::{Alert, UsageSnapshot};

#[derive(Debug, Error)]
pub enum TaskServiceError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Rejected(#[from] PolicyRejection),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("caller directory unavailable: {0}")]
    Directory(#[from] RepositoryError),
}

/// Outcome of `submit`
#[derive(Debug, Clone)]
pub enum Submission {
    /// Sync single dispatch
    Single(ProviderResult),
    /// Sync multi dispatch
    Multi(AggregatedResult),
    /// Async; poll the job for the result
    Queued(JobStatus),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub alerts: Vec<Alert>,
    pub usage: UsageSnapshot,
    /// Policy rejections over the same window
    pub security: SecurityStats,
    pub queue_depth: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub queue_depth: usize,
    pub providers: Vec<ProviderId>,
}

pub struct TaskService {
    manager: Arc<ProviderManager>,
    gate: Arc<PolicyGate>,
    queue: Arc<JobQueue>,
    monitor: Arc<UsageMonitor>,
    callers: Arc<dyn CallerDirectory>,
    defaults: GenerationOptions,
    default_window: Duration,
    started: Instant,
}

impl TaskService {
    pub fn new(
        manager: Arc<ProviderManager>,
        gate: Arc<PolicyGate>,
        queue: Arc<JobQueue>,
        monitor: Arc<UsageMonitor>,
        callers: Arc<dyn CallerDirectory>,
        defaults: GenerationOptions,
        default_window: Duration,
    ) -> Self {
        Self {
            manager,
            gate,
            queue,
            monitor,
            callers,
            defaults,
            default_window,
            started: Instant::now(),
        }
    }

    /// Resolve the identity presented by the client
    pub async fn authenticate(&self, caller_id: Option<&str>) -> Result<Caller, TaskServiceError> {
        let raw = caller_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| TaskServiceError::Unauthenticated("missing caller identity".into()))?;

        self.callers
            .resolve(&CallerId::new(raw))
            .await?
            .ok_or_else(|| TaskServiceError::Unauthenticated(format!("unknown caller '{}'", raw)))
    }

    pub async fn submit(
        &self,
        caller: &Caller,
        request: TaskRequest,
        dispatch: DispatchMode,
    ) -> Result<Submission, TaskServiceError> {
        let task = request.into_task(caller.id.clone(), dispatch, &self.defaults)?;

        if let Some(unknown) = task
            .providers
            .iter()
            .find(|p| !self.manager.adapters().contains(p))
        {
            return Err(ValidationError::UnknownProvider(unknown.to_string()).into());
        }

        if let PolicyDecision::Deny(rejection) = self.gate.check(&task, caller) {
            return Err(rejection.into());
        }

        info!(
            task_id = %task.id,
            caller_id = %caller.id,
            kind = task.kind.as_str(),
            providers = task.providers.len(),
            mode = ?task.mode,
            "Task accepted"
        );

        match (task.mode, task.dispatch) {
            (ExecutionMode::Async, _) => Ok(Submission::Queued(self.queue.enqueue(task))),
            (ExecutionMode::Sync, DispatchMode::Single) => {
                Ok(Submission::Single(self.manager.execute_single(&task).await))
            }
            (ExecutionMode::Sync, DispatchMode::Multi) => {
                Ok(Submission::Multi(self.manager.execute_multiple(&task).await))
            }
        }
    }

    /// Jobs are visible to their owner and to admins only
    pub fn poll(&self, caller: &Caller, job_id: JobId) -> Result<JobStatus, TaskServiceError> {
        self.queue
            .poll(job_id)
            .filter(|status| visible_to(caller, status))
            .ok_or(TaskServiceError::Job(JobError::NotFound(job_id)))
    }

    pub fn cancel(&self, caller: &Caller, job_id: JobId) -> Result<JobStatus, TaskServiceError> {
        self.poll(caller, job_id)?;
        Ok(self.queue.cancel(job_id)?)
    }

    pub fn monitor_status(&self, window: Option<Duration>) -> MonitorStatus {
        let window = window.unwrap_or(self.default_window);
        let usage = self.monitor.snapshot(window);
        MonitorStatus {
            alerts: self.monitor.alerts_for(&usage),
            usage,
            security: self.monitor.security_stats(window),
            queue_depth: self.queue.depth(),
        }
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds: self.started.elapsed().as_secs(),
            queue_depth: self.queue.depth(),
            providers: self.manager.adapters().ids(),
        }
    }
}

fn visible_to(caller: &Caller, status: &JobStatus) -> bool {
    caller.role == Role::Admin || status.owner == caller.id
}

#[async_trait]
impl JobExecutor for TaskService {
    async fn execute(&self, task: &Task) -> AggregatedResult {
        match task.dispatch {
            DispatchMode::Single => {
                AggregatedResult::from_single(self.manager.execute_single(task).await)
            }
            DispatchMode::Multi => self.manager.execute_multiple(task).await,
        }
    }
}
