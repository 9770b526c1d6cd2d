// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod housekeeping;
pub mod job_queue;
pub mod monitor;
pub mod policy_gate;
pub mod provider_manager;
pub mod task_service;
pub mod worker;

// Re-export use cases for convenience
pub use housekeeping::{Housekeeper, SweepReport};
pub use job_queue::{ClaimedJob, JobQueue};
pub use monitor::UsageMonitor;
pub use policy_gate::PolicyGate;
pub use provider_manager::ProviderManager;
pub use task_service::{HealthStatus, MonitorStatus, Submission, TaskService, TaskServiceError};
pub use worker::{JobExecutor, WorkerPool};
