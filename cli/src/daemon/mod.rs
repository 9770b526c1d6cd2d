// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Daemon wiring and the HTTP client used by the operator commands
//!
//! - [`server`] assembles the orchestrator from configuration and serves the API
//! - [`client`] talks to a running daemon

pub mod client;
pub mod server;

pub use client::{DaemonClient, SubmitOutcome};
pub use server::{start_server, Orchestrator};
