// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::domain::repository::{RepositoryError, UsageSink};
use crate::domain::usage::UsageRecord;

const CREATE_USAGE_RECORDS: &str = r#"
    CREATE TABLE IF NOT EXISTS usage_records (
        id BIGSERIAL PRIMARY KEY,
        caller_id TEXT NOT NULL,
        task_id UUID NOT NULL,
        provider TEXT NOT NULL,
        kind TEXT NOT NULL,
        success BOOLEAN NOT NULL,
        tokens_used BIGINT NOT NULL,
        cost_usd DOUBLE PRECISION NOT NULL,
        latency_ms BIGINT NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL
    )
"#;

const CREATE_USAGE_RECORDS_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS usage_records_caller_time
        ON usage_records (caller_id, recorded_at)
"#;

pub struct PostgresUsageSink {
    pool: PgPool,
}

impl PostgresUsageSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        for statement in [CREATE_USAGE_RECORDS, CREATE_USAGE_RECORDS_INDEX] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    RepositoryError::Database(format!("Failed to create usage schema: {}", e))
                })?;
        }
        Ok(())
    }
}

#[async_trait]
impl UsageSink for PostgresUsageSink {
    async fn append(&self, records: &[UsageRecord]) -> Result<(), RepositoryError> {
        if records.is_empty() {
            return Ok(());
        }

        // One transaction per batch so a flush lands entirely or not at all
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO usage_records (
                    caller_id, task_id, provider, kind, success,
                    tokens_used, cost_usd, latency_ms, recorded_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(record.caller_id.as_str())
            .bind(record.task_id.0)
            .bind(record.provider.as_str())
            .bind(record.kind.as_str())
            .bind(record.success)
            .bind(i64::from(record.tokens_used))
            .bind(record.cost_usd)
            .bind(record.latency_ms as i64)
            .bind(record.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to append usage record: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(())
    }
}
