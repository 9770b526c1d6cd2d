// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts consumed by the orchestrator, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Purpose | Implementations |
//! |-------|---------|----------------|
//! | `UsageSink` | Durable append of usage records | `PostgresUsageSink` |
//! | `CallerDirectory` | Caller identity → role | `StaticCallerDirectory`, `PostgresCallerDirectory` |
//!
//! ## Storage Backend Abstraction
//!
//! Concrete implementations are selected at daemon startup: when
//! `database.url` is configured the PostgreSQL implementations are used,
//! otherwise the in-process ones.

use async_trait::async_trait;

use crate::domain::task::{Caller, CallerId};
use crate::domain::usage::UsageRecord;

/// Append-only durable store for usage records.
///
/// The in-memory ledger owned by the usage monitor stays authoritative for
/// quota and alert evaluation; a sink only has to persist.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn append(&self, records: &[UsageRecord]) -> Result<(), RepositoryError>;
}

/// Resolves an authenticated caller identity to its role.
#[async_trait]
pub trait CallerDirectory: Send + Sync {
    /// `Ok(None)` when the identity is unknown.
    async fn resolve(&self, id: &CallerId) -> Result<Option<Caller>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
