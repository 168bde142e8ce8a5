// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::context::ApplicabilityContext;
use crate::domain::repository::{RepositoryError, StrategyRepository};
use crate::domain::strategy::{LearningUpdate, Strategy, StrategyId, StrategyMatch};

const STRATEGY_COLUMNS: &str = r#"
    id, strategy_type, content, description, confidence,
    supporting_episodes, contradicting_episodes,
    times_applied, success_count, failure_count, version,
    created_at, last_validated_at, last_applied_at, last_evaluated_at, is_active
"#;

pub struct PostgresStrategyRepository {
    pool: PgPool,
}

impl PostgresStrategyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn strategy_from_row(row: &PgRow) -> Result<Strategy, RepositoryError> {
    let times_applied: i64 = row.try_get("times_applied")?;
    let success_count: i64 = row.try_get("success_count")?;
    let failure_count: i64 = row.try_get("failure_count")?;
    let version: i32 = row.try_get("version")?;

    Ok(Strategy {
        id: StrategyId(row.try_get("id")?),
        strategy_type: row.try_get("strategy_type")?,
        content: serde_json::from_value(row.try_get("content")?)?,
        description: row.try_get("description")?,
        confidence: row.try_get("confidence")?,
        supporting_episodes: serde_json::from_value(row.try_get("supporting_episodes")?)?,
        contradicting_episodes: serde_json::from_value(row.try_get("contradicting_episodes")?)?,
        times_applied: times_applied.max(0) as u64,
        success_count: success_count.max(0) as u64,
        failure_count: failure_count.max(0) as u64,
        version: version.max(1) as u32,
        created_at: row.try_get("created_at")?,
        last_validated_at: row.try_get("last_validated_at")?,
        last_applied_at: row.try_get("last_applied_at")?,
        last_evaluated_at: row.try_get("last_evaluated_at")?,
        is_active: row.try_get("is_active")?,
    })
}

#[async_trait]
impl StrategyRepository for PostgresStrategyRepository {
    async fn upsert(&self, strategy: &Strategy) -> Result<(), RepositoryError> {
        let content = serde_json::to_value(&strategy.content)?;
        let supporting = serde_json::to_value(&strategy.supporting_episodes)?;
        let contradicting = serde_json::to_value(&strategy.contradicting_episodes)?;

        sqlx::query(
            r#"
            INSERT INTO strategies (
                id, strategy_type, signature, content, description, confidence,
                supporting_episodes, contradicting_episodes,
                times_applied, success_count, failure_count, version,
                created_at, last_validated_at, last_applied_at, last_evaluated_at, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (id) DO UPDATE SET
                signature = EXCLUDED.signature,
                content = EXCLUDED.content,
                description = EXCLUDED.description,
                confidence = EXCLUDED.confidence,
                supporting_episodes = EXCLUDED.supporting_episodes,
                contradicting_episodes = EXCLUDED.contradicting_episodes,
                success_count = EXCLUDED.success_count,
                failure_count = EXCLUDED.failure_count,
                version = EXCLUDED.version,
                last_validated_at = EXCLUDED.last_validated_at,
                last_evaluated_at = EXCLUDED.last_evaluated_at,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(strategy.id.0)
        .bind(&strategy.strategy_type)
        .bind(strategy.signature())
        .bind(content)
        .bind(&strategy.description)
        .bind(strategy.confidence.clamp(0.0, 1.0))
        .bind(supporting)
        .bind(contradicting)
        .bind(strategy.times_applied as i64)
        .bind(strategy.success_count as i64)
        .bind(strategy.failure_count as i64)
        .bind(strategy.version as i32)
        .bind(strategy.created_at)
        .bind(strategy.last_validated_at)
        .bind(strategy.last_applied_at)
        .bind(strategy.last_evaluated_at)
        .bind(strategy.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save strategy: {}", e)))?;

        Ok(())
    }

    async fn update_evidence(&self, strategy: &Strategy) -> Result<(), RepositoryError> {
        let content = serde_json::to_value(&strategy.content)?;
        let supporting = serde_json::to_value(&strategy.supporting_episodes)?;
        let contradicting = serde_json::to_value(&strategy.contradicting_episodes)?;

        let result = sqlx::query(
            r#"
            UPDATE strategies SET
                content = $2,
                description = $3,
                confidence = $4,
                supporting_episodes = $5,
                contradicting_episodes = $6,
                version = $7
            WHERE id = $1
            "#,
        )
        .bind(strategy.id.0)
        .bind(content)
        .bind(&strategy.description)
        .bind(strategy.confidence.clamp(0.0, 1.0))
        .bind(supporting)
        .bind(contradicting)
        .bind(strategy.version as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to update strategy evidence: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("strategy {}", strategy.id)));
        }
        Ok(())
    }

    async fn apply_learning(&self, id: StrategyId, update: &LearningUpdate) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE strategies SET
                success_count = success_count + $2,
                failure_count = failure_count + $3,
                confidence = $4,
                last_validated_at = $5,
                last_evaluated_at = $5,
                is_active = is_active AND $6
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(update.successes as i64)
        .bind(update.failures as i64)
        .bind(update.confidence.clamp(0.0, 1.0))
        .bind(update.evaluated_at)
        .bind(update.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to apply learning update: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("strategy {}", id)));
        }
        Ok(())
    }

    async fn get(&self, id: StrategyId) -> Result<Option<Strategy>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM strategies WHERE id = $1", STRATEGY_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(strategy_from_row).transpose()
    }

    async fn find_by_signature(&self, signature: &str) -> Result<Option<Strategy>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM strategies WHERE signature = $1", STRATEGY_COLUMNS))
            .bind(signature)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(strategy_from_row).transpose()
    }

    async fn find_applicable(
        &self,
        context: &ApplicabilityContext,
        min_confidence: f64,
    ) -> Result<Vec<StrategyMatch>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM strategies WHERE is_active AND confidence >= $1 ORDER BY confidence DESC",
            STRATEGY_COLUMNS
        ))
        .bind(min_confidence)
        .fetch_all(&self.pool)
        .await?;

        let mut matches = Vec::new();
        for row in &rows {
            let strategy = strategy_from_row(row)?;
            if let Some(score) = strategy.applicability(context) {
                matches.push(StrategyMatch {
                    strategy,
                    applicability_score: score,
                });
            }
        }

        matches.sort_by(|a, b| {
            b.strategy
                .confidence
                .total_cmp(&a.strategy.confidence)
                .then(b.applicability_score.total_cmp(&a.applicability_score))
        });
        Ok(matches)
    }

    async fn list_active(&self) -> Result<Vec<Strategy>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM strategies WHERE is_active ORDER BY created_at",
            STRATEGY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(strategy_from_row).collect()
    }

    async fn deactivate(&self, id: StrategyId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE strategies SET is_active = FALSE WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("strategy {}", id)));
        }
        Ok(())
    }

    async fn record_application(&self, id: StrategyId, applied_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE strategies SET times_applied = times_applied + 1, last_applied_at = $2 WHERE id = $1",
        )
        .bind(id.0)
        .bind(applied_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("strategy {}", id)));
        }
        Ok(())
    }
}
