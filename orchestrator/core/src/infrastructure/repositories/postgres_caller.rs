// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::warn;

use crate::domain::repository::{CallerDirectory, RepositoryError};
use crate::domain::task::{Caller, CallerId, Role};

/// Resolves callers against the application's `users` table.
pub struct PostgresCallerDirectory {
    pool: PgPool,
}

impl PostgresCallerDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallerDirectory for PostgresCallerDirectory {
    async fn resolve(&self, id: &CallerId) -> Result<Option<Caller>, RepositoryError> {
        let row = sqlx::query("SELECT role FROM users WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role: String = row
            .try_get("role")
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        match role.parse::<Role>() {
            Ok(role) => Ok(Some(Caller {
                id: id.clone(),
                role,
            })),
            Err(e) => {
                // Unknown roles are treated as unknown callers
                warn!(caller_id = %id, "Ignoring caller with {}", e);
                Ok(None)
            }
        }
    }
}
