// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for AI Central CLI

pub mod config;
pub mod monitor;
pub mod task;

pub use self::config::ConfigCommand;
pub use self::monitor::MonitorCommand;
pub use self::task::TaskCommand;

use anyhow::{Context, Result};

use crate::daemon::DaemonClient;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

/// Where client commands send their requests, and as whom.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub caller: Option<String>,
}

impl Target {
    pub fn new(host: Option<String>, port: Option<u16>, caller: Option<String>) -> Self {
        Self {
            host: host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: port.unwrap_or(DEFAULT_PORT),
            caller,
        }
    }

    pub fn client(&self) -> Result<DaemonClient> {
        DaemonClient::new(&self.host, self.port, self.caller.clone())
    }

    /// Client for endpoints that require a caller identity
    pub fn caller_client(&self) -> Result<DaemonClient> {
        self.caller
            .as_ref()
            .context("A caller identity is required: pass --caller or set AI_CENTRAL_CALLER_ID")?;
        self.client()
    }
}
