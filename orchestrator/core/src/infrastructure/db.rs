// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype that is
//! injected into the PostgreSQL repository implementations.
//!
//! Optional: without `spec.database` the orchestrator runs entirely
//! in-process and usage records are kept only in the monitor ledger.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}
