// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Job Aggregate
//!
//! Queue-side wrapper around a [`Task`] submitted in async mode.
//!
//! ```text
//! queued ──▶ running ──▶ succeeded
//!   │           └──────▶ failed
//!   └──▶ cancelled
//! ```
//!
//! Terminal states are final; any other transition is rejected with
//! [`JobError::InvalidTransition`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::llm::AggregatedResult;
use crate::domain::task::{CallerId, Priority, Task, TaskId, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobState,
        to: JobState,
    },
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub task: Task,
    pub owner: CallerId,
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    state: JobState,
    result: Option<AggregatedResult>,
    error: Option<String>,
}

impl Job {
    pub fn new(task: Task) -> Self {
        Self {
            id: JobId::new(),
            owner: task.caller_id.clone(),
            priority: task.priority,
            task,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            state: JobState::Queued,
            result: None,
            error: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn result(&self) -> Option<&AggregatedResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn transition(&mut self, from: JobState, to: JobState) -> Result<(), JobError> {
        if self.state != from {
            return Err(JobError::InvalidTransition {
                job_id: self.id,
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), JobError> {
        self.transition(JobState::Queued, JobState::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn succeed(&mut self, result: AggregatedResult) -> Result<(), JobError> {
        self.transition(JobState::Running, JobState::Succeeded)?;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobState::Running, JobState::Failed)?;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), JobError> {
        self.transition(JobState::Queued, JobState::Cancelled)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            job_id: self.id,
            task_id: self.task.id,
            kind: self.task.kind,
            owner: self.owner.clone(),
            state: self.state,
            priority: self.priority,
            enqueued_at: self.enqueued_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

/// Read-only snapshot of a job returned by polling.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub kind: TaskKind,
    #[serde(skip)]
    pub owner: CallerId,
    pub state: JobState,
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AggregatedResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
