// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Worker Pool
//!
//! Fixed number of worker loops pulling from the shared [`JobQueue`]. Each
//! claimed job runs in its own spawned task so that a panic is contained and
//! recorded as a failed job instead of killing the worker.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::job_queue::{ClaimedJob, JobQueue};
use crate::domain::llm::AggregatedResult;
use crate::domain::task::Task;

/// Runs a claimed task to completion. Provider failures are part of the
/// returned result; only a panic counts as a failed job.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, task: &Task) -> AggregatedResult;
}

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        size: usize,
        queue: Arc<JobQueue>,
        executor: Arc<dyn JobExecutor>,
        shutdown: CancellationToken,
    ) -> Self {
        let size = size.max(1);
        info!(workers = size, "Starting worker pool");

        let handles = (0..size)
            .map(|worker| {
                let queue = queue.clone();
                let executor = executor.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { run_worker(worker, queue, executor, shutdown).await })
            })
            .collect();

        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to finish its current job and exit
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Worker exited abnormally: {}", e);
            }
        }
        info!("Worker pool stopped");
    }
}

async fn run_worker(
    worker: usize,
    queue: Arc<JobQueue>,
    executor: Arc<dyn JobExecutor>,
    shutdown: CancellationToken,
) {
    debug!(worker, "Worker started");

    while let Some(ClaimedJob { job_id, task }) = queue.next_job(&shutdown).await {
        debug!(worker, job_id = %job_id, task_id = %task.id, "Worker claimed job");

        let task_id = task.id;
        let executor = executor.clone();
        let outcome = tokio::spawn(async move { executor.execute(&task).await }).await;

        let recorded = match outcome {
            Ok(result) => queue.complete(job_id, result),
            Err(join_error) => {
                let diagnostic = format!("internal fault: {}", describe(join_error));
                error!(
                    worker,
                    job_id = %job_id,
                    task_id = %task_id,
                    "Job execution failed: {}",
                    diagnostic
                );
                queue.fail(job_id, diagnostic)
            }
        };

        if let Err(e) = recorded {
            // Only possible if the job was evicted while running
            warn!(worker, job_id = %job_id, "Could not record job outcome: {}", e);
        }
    }

    debug!(worker, "Worker stopped");
}

fn describe(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }
    let payload = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic".to_string()
    }
}
