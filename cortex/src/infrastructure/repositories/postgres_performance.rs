// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::decision::ProjectId;
use crate::domain::episode::EpisodeId;
use crate::domain::performance::{ApplicationRecordId, StrategyApplicationRecord};
use crate::domain::repository::{PerformanceLog, RepositoryError};
use crate::domain::strategy::StrategyId;

const RECORD_COLUMNS: &str = r#"
    id, strategy_id, episode_id, project_id, applied_at, predicted_outcome,
    actual_outcome, outcome_quality, strategy_confidence_at_application,
    context_similarity, performance_delta, resolved_at, evaluated_at
"#;

pub struct PostgresPerformanceLog {
    pool: PgPool,
}

impl PostgresPerformanceLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<StrategyApplicationRecord, RepositoryError> {
    Ok(StrategyApplicationRecord {
        id: ApplicationRecordId(row.try_get("id")?),
        strategy_id: StrategyId(row.try_get("strategy_id")?),
        episode_id: EpisodeId(row.try_get("episode_id")?),
        project_id: ProjectId(row.try_get("project_id")?),
        applied_at: row.try_get("applied_at")?,
        predicted_outcome: serde_json::from_value(row.try_get("predicted_outcome")?)?,
        actual_outcome: row.try_get("actual_outcome")?,
        outcome_quality: row.try_get("outcome_quality")?,
        strategy_confidence_at_application: row.try_get("strategy_confidence_at_application")?,
        context_similarity: row.try_get("context_similarity")?,
        performance_delta: row.try_get("performance_delta")?,
        resolved_at: row.try_get("resolved_at")?,
        evaluated_at: row.try_get("evaluated_at")?,
    })
}

#[async_trait]
impl PerformanceLog for PostgresPerformanceLog {
    async fn append(&self, record: &StrategyApplicationRecord) -> Result<(), RepositoryError> {
        let predicted = serde_json::to_value(&record.predicted_outcome)?;

        sqlx::query(
            r#"
            INSERT INTO strategy_applications (
                id, strategy_id, episode_id, project_id, applied_at, predicted_outcome,
                actual_outcome, outcome_quality, strategy_confidence_at_application,
                context_similarity, performance_delta, resolved_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id.0)
        .bind(record.strategy_id.0)
        .bind(record.episode_id.0)
        .bind(record.project_id.0)
        .bind(record.applied_at)
        .bind(predicted)
        .bind(&record.actual_outcome)
        .bind(record.outcome_quality)
        .bind(record.strategy_confidence_at_application)
        .bind(record.context_similarity)
        .bind(record.performance_delta)
        .bind(record.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to append application record: {}", e)))?;

        Ok(())
    }

    async fn list_since(
        &self,
        strategy_id: StrategyId,
        since: DateTime<Utc>,
    ) -> Result<Vec<StrategyApplicationRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM strategy_applications
            WHERE strategy_id = $1 AND resolved_at IS NOT NULL AND resolved_at > $2
            ORDER BY resolved_at
            "#,
            RECORD_COLUMNS
        ))
        .bind(strategy_id.0)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn claim_unevaluated(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<Vec<StrategyApplicationRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            UPDATE strategy_applications SET evaluated_at = $2
            WHERE strategy_id = $1 AND resolved_at IS NOT NULL AND evaluated_at IS NULL
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(strategy_id.0)
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to claim application records: {}", e)))?;

        let mut records = rows.iter().map(record_from_row).collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| r.resolved_at);
        Ok(records)
    }

    async fn release_claim(&self, ids: &[ApplicationRecordId]) -> Result<(), RepositoryError> {
        let ids: Vec<uuid::Uuid> = ids.iter().map(|id| id.0).collect();
        sqlx::query("UPDATE strategy_applications SET evaluated_at = NULL WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_open_for_episode(&self, episode_id: EpisodeId) -> Result<Vec<StrategyApplicationRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM strategy_applications WHERE episode_id = $1 AND outcome_quality IS NULL",
            RECORD_COLUMNS
        ))
        .bind(episode_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn update(&self, record: &StrategyApplicationRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE strategy_applications SET
                actual_outcome = $2,
                outcome_quality = $3,
                context_similarity = $4,
                performance_delta = $5,
                resolved_at = $6
            WHERE id = $1
            "#,
        )
        .bind(record.id.0)
        .bind(&record.actual_outcome)
        .bind(record.outcome_quality)
        .bind(record.context_similarity)
        .bind(record.performance_delta)
        .bind(record.resolved_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("application record {:?}", record.id)));
        }
        Ok(())
    }
}
