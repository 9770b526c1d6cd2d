// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Value objects, aggregates and contracts of the task orchestrator. Nothing
//! here performs I/O.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Tasks, provider results, jobs, policy, consensus and usage

pub mod comparison;
pub mod consensus;
pub mod job;
pub mod llm;
pub mod node_config;
pub mod policy;
pub mod repository;
pub mod task;
pub mod usage;
