// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the persistence contracts defined in
//! `crate::domain::repository`.
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresUsageSink** - Durable `usage_records` table
//! - **PostgresCallerDirectory** - Role lookup in the `users` table
//!
//! ## In-Process Repositories
//!
//! Used when no database is configured, and in tests. Without a sink the
//! monitor ledger is the only record of usage.
//! - **StaticCallerDirectory** - Callers declared under `spec.callers`
//!
//! # Usage
//!
//! ```no_run
//! # async fn example(database_url: &str) -> anyhow::Result<()> {
//! use central_core::infrastructure::db::Database;
//! use central_core::infrastructure::repositories::PostgresUsageSink;
//!
//! let db = Database::new(database_url, 5).await?;
//! let sink = PostgresUsageSink::new(db.get_pool().clone());
//! sink.ensure_schema().await?;
//! # Ok(())
//! # }
//! ```

pub mod postgres_caller;
pub mod postgres_usage;

pub use postgres_caller::PostgresCallerDirectory;
pub use postgres_usage::PostgresUsageSink;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::repository::{CallerDirectory, RepositoryError};
use crate::domain::task::{Caller, CallerId};

/// Caller directory backed by configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCallerDirectory {
    callers: HashMap<CallerId, Caller>,
}

impl StaticCallerDirectory {
    pub fn new(callers: impl IntoIterator<Item = Caller>) -> Self {
        Self {
            callers: callers.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }
}

#[async_trait]
impl CallerDirectory for StaticCallerDirectory {
    async fn resolve(&self, id: &CallerId) -> Result<Option<Caller>, RepositoryError> {
        Ok(self.callers.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::Role;

    #[tokio::test]
    async fn test_static_directory_resolves_known_callers() {
        let directory = StaticCallerDirectory::new(vec![
            Caller {
                id: CallerId::new("alice"),
                role: Role::Admin,
            },
            Caller {
                id: CallerId::new("bob"),
                role: Role::User,
            },
        ]);

        let alice = directory.resolve(&CallerId::new("alice")).await.unwrap();
        assert_eq!(alice.map(|c| c.role), Some(Role::Admin));
        assert!(directory.resolve(&CallerId::new("mallory")).await.unwrap().is_none());
        assert_eq!(directory.len(), 2);
    }
}
