// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! AI Central Core
//!
//! Task orchestration between content-platform callers and external AI
//! providers: policy gate, prompt composition, single and fan-out dispatch,
//! moderation consensus, usage alerts and a priority job queue.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain, application services, infrastructure adapters and
//!   the HTTP presentation layer consumed by the `ai-central` daemon

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
