// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Priority Job Queue
//!
//! In-memory queue of async tasks. Dequeue order is highest priority first
//! and FIFO within equal priority, using a monotonic sequence number as the
//! tie-break. One mutex guards both the heap and the job table, so a job's
//! state and its queue position never disagree.
//!
//! Cancelled jobs stay in the heap and are skipped when popped.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::job::{Job, JobError, JobId, JobState, JobStatus};
use crate::domain::llm::AggregatedResult;
use crate::domain::task::{Priority, Task};

#[derive(Debug, PartialEq, Eq)]
struct QueueEntry {
    priority: Priority,
    sequence: u64,
    job_id: JobId,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then the lower (older) sequence
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueueEntry>,
    jobs: HashMap<JobId, Job>,
    next_sequence: u64,
}

/// A job handed to a worker. The job is already `running`.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job_id: JobId,
    pub task: Task,
}

#[derive(Default)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

fn count_transition(state: JobState) {
    metrics::counter!("ai_central_jobs_total", "state" => state.as_str()).increment(1);
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, task: Task) -> JobStatus {
        let job = Job::new(task);
        let status = job.status();

        {
            let mut state = self.state.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.heap.push(QueueEntry {
                priority: job.priority,
                sequence,
                job_id: job.id,
            });
            state.jobs.insert(job.id, job);
        }

        count_transition(JobState::Queued);
        debug!(
            job_id = %status.job_id,
            task_id = %status.task_id,
            priority = status.priority.value(),
            "Job enqueued"
        );
        self.notify.notify_one();
        status
    }

    /// Side-effect free snapshot of a job
    pub fn poll(&self, job_id: JobId) -> Option<JobStatus> {
        self.state.lock().jobs.get(&job_id).map(Job::status)
    }

    /// Cancel a job that has not been claimed yet
    pub fn cancel(&self, job_id: JobId) -> Result<JobStatus, JobError> {
        let status = {
            let mut state = self.state.lock();
            let job = state.jobs.get_mut(&job_id).ok_or(JobError::NotFound(job_id))?;
            job.cancel()?;
            job.status()
        };
        count_transition(JobState::Cancelled);
        info!(job_id = %job_id, "Job cancelled");
        Ok(status)
    }

    /// Claim the next queued job without waiting
    pub fn dequeue(&self) -> Option<ClaimedJob> {
        let claimed = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            loop {
                let entry = state.heap.pop()?;
                let Some(job) = state.jobs.get_mut(&entry.job_id) else {
                    continue; // evicted
                };
                if job.start().is_ok() {
                    break ClaimedJob {
                        job_id: job.id,
                        task: job.task.clone(),
                    };
                }
            }
        };
        count_transition(JobState::Running);
        Some(claimed)
    }

    /// Wait for the next job. Returns `None` once `shutdown` is cancelled.
    pub async fn next_job(&self, shutdown: &CancellationToken) -> Option<ClaimedJob> {
        loop {
            if shutdown.is_cancelled() {
                return None;
            }

            // Register interest before checking so an enqueue in between is not lost
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(job) = self.dequeue() {
                return Some(job);
            }

            tokio::select! {
                _ = shutdown.cancelled() => return None,
                _ = &mut notified => {}
            }
        }
    }

    pub fn complete(&self, job_id: JobId, result: AggregatedResult) -> Result<(), JobError> {
        self.state
            .lock()
            .jobs
            .get_mut(&job_id)
            .ok_or(JobError::NotFound(job_id))?
            .succeed(result)?;
        count_transition(JobState::Succeeded);
        Ok(())
    }

    pub fn fail(&self, job_id: JobId, error: impl Into<String>) -> Result<(), JobError> {
        self.state
            .lock()
            .jobs
            .get_mut(&job_id)
            .ok_or(JobError::NotFound(job_id))?
            .fail(error)?;
        count_transition(JobState::Failed);
        Ok(())
    }

    /// Drop terminal jobs that finished before `cutoff`
    pub fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut state = self.state.lock();
        let before = state.jobs.len();
        state.jobs.retain(|_, job| {
            !(job.state().is_terminal() && job.finished_at.is_some_and(|at| at < cutoff))
        });
        before - state.jobs.len()
    }

    /// Number of jobs waiting to be claimed
    pub fn depth(&self) -> usize {
        self.state
            .lock()
            .jobs
            .values()
            .filter(|job| job.state() == JobState::Queued)
            .count()
    }

    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().jobs.is_empty()
    }
}
