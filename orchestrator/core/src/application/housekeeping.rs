// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Housekeeping
//!
//! Periodic background sweep that evicts finished jobs past their retention
//! and prunes usage records older than the monitor's retention window.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::job_queue::JobQueue;
use crate::application::monitor::UsageMonitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    pub jobs_evicted: usize,
    pub records_pruned: usize,
}

pub struct Housekeeper {
    queue: Arc<JobQueue>,
    monitor: Arc<UsageMonitor>,
    job_retention: Duration,
    interval: Duration,
    shutdown: CancellationToken,
}

impl Housekeeper {
    pub fn new(
        queue: Arc<JobQueue>,
        monitor: Arc<UsageMonitor>,
        job_retention: Duration,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            monitor,
            job_retention,
            interval,
            shutdown,
        }
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        info!(
            interval_seconds = self.interval.as_secs(),
            job_retention_seconds = self.job_retention.as_secs(),
            "Starting housekeeping task"
        );

        let mut tick = interval(self.interval.max(Duration::from_secs(1)));

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let report = self.sweep();
                    if report != SweepReport::default() {
                        info!(
                            jobs_evicted = report.jobs_evicted,
                            records_pruned = report.records_pruned,
                            "Housekeeping sweep completed"
                        );
                    } else {
                        debug!("Housekeeping sweep found nothing to remove");
                    }
                }
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping housekeeping");
                    break;
                }
            }
        }
    }

    pub fn sweep(&self) -> SweepReport {
        let retention = chrono::Duration::from_std(self.job_retention)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(retention)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        SweepReport {
            jobs_evicted: self.queue.evict_finished_before(cutoff),
            records_pruned: self.monitor.prune(),
        }
    }
}
