// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::decision::ProjectId;
use crate::domain::episode::{clamp_quality, Episode, EpisodeId, EpisodeType, ScoredEpisode};
use crate::domain::repository::{EpisodeRepository, RepositoryError};

/// Embeddings are stored in an untyped pgvector column and read back as
/// `real[]`, so the embedding dimension is a deployment choice.
const EPISODE_COLUMNS: &str = r#"
    id, project_id, episode_type, created_at, context, narrative, summary,
    decision, actions, patterns, outcome, outcome_quality,
    embedding::real[] AS embedding, requires_embedding
"#;

pub struct PostgresEpisodeRepository {
    pool: PgPool,
}

impl PostgresEpisodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn episode_from_row(row: &PgRow) -> Result<Episode, RepositoryError> {
    let episode_type: String = row.try_get("episode_type")?;
    let episode_type = EpisodeType::parse(&episode_type)
        .ok_or_else(|| RepositoryError::Serialization(format!("Unknown episode type: {}", episode_type)))?;

    Ok(Episode {
        id: EpisodeId(row.try_get("id")?),
        project_id: ProjectId(row.try_get("project_id")?),
        episode_type,
        timestamp: row.try_get("created_at")?,
        context: serde_json::from_value(row.try_get("context")?)?,
        narrative: row.try_get("narrative")?,
        summary: row.try_get("summary")?,
        decision: serde_json::from_value(row.try_get("decision")?)?,
        actions: serde_json::from_value(row.try_get("actions")?)?,
        patterns: row.try_get("patterns")?,
        outcome: row.try_get("outcome")?,
        outcome_quality: row.try_get("outcome_quality")?,
        embedding: row.try_get("embedding")?,
        requires_embedding: row.try_get("requires_embedding")?,
    })
}

#[async_trait]
impl EpisodeRepository for PostgresEpisodeRepository {
    async fn put(&self, episode: &Episode) -> Result<EpisodeId, RepositoryError> {
        let context = serde_json::to_value(&episode.context)?;
        let decision = serde_json::to_value(&episode.decision)?;
        let actions = serde_json::to_value(&episode.actions)?;

        sqlx::query(
            r#"
            INSERT INTO episodes (
                id, project_id, episode_type, created_at, context, narrative, summary,
                decision, actions, patterns, outcome, outcome_quality,
                embedding, requires_embedding
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13::real[]::vector, $14)
            ON CONFLICT (id) DO UPDATE SET
                context = EXCLUDED.context,
                narrative = EXCLUDED.narrative,
                summary = EXCLUDED.summary,
                decision = EXCLUDED.decision,
                actions = EXCLUDED.actions,
                patterns = EXCLUDED.patterns,
                outcome = EXCLUDED.outcome,
                outcome_quality = EXCLUDED.outcome_quality,
                embedding = EXCLUDED.embedding,
                requires_embedding = EXCLUDED.requires_embedding
            "#,
        )
        .bind(episode.id.0)
        .bind(episode.project_id.0)
        .bind(episode.episode_type.as_str())
        .bind(episode.timestamp)
        .bind(context)
        .bind(&episode.narrative)
        .bind(&episode.summary)
        .bind(decision)
        .bind(actions)
        .bind(&episode.patterns)
        .bind(&episode.outcome)
        .bind(episode.outcome_quality.map(clamp_quality))
        .bind(&episode.embedding)
        .bind(episode.requires_embedding)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save episode: {}", e)))?;

        Ok(episode.id)
    }

    async fn get(&self, id: EpisodeId) -> Result<Option<Episode>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM episodes WHERE id = $1", EPISODE_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(episode_from_row).transpose()
    }

    async fn get_similar(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEpisode>, RepositoryError> {
        let query = format!(
            r#"
            SELECT {}, 1 - (embedding <=> $1::real[]::vector) AS similarity
            FROM episodes
            WHERE NOT requires_embedding
              AND embedding IS NOT NULL
              AND vector_dims(embedding) = cardinality($1::real[])
            ORDER BY embedding <=> $1::real[]::vector
            LIMIT $2
            "#,
            EPISODE_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(vector.to_vec())
            .bind(k as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ScoredEpisode {
                    episode: episode_from_row(row)?,
                    similarity: row.try_get("similarity")?,
                })
            })
            .collect()
    }

    async fn update_outcome(
        &self,
        id: EpisodeId,
        outcome: serde_json::Value,
        quality: f64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE episodes SET outcome = $2, outcome_quality = $3 WHERE id = $1")
            .bind(id.0)
            .bind(outcome)
            .bind(clamp_quality(quality))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("episode {}", id)));
        }
        Ok(())
    }

    async fn attach_embedding(&self, id: EpisodeId, embedding: Vec<f32>) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE episodes SET embedding = $2::real[]::vector, requires_embedding = FALSE WHERE id = $1",
        )
        .bind(id.0)
        .bind(embedding)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("episode {}", id)));
        }
        Ok(())
    }

    async fn list_pending_embedding(&self, since: DateTime<Utc>) -> Result<Vec<Episode>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM episodes WHERE requires_embedding AND created_at >= $1 ORDER BY created_at",
            EPISODE_COLUMNS
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(episode_from_row).collect()
    }

    async fn list_with_outcome_since(&self, since: DateTime<Utc>) -> Result<Vec<Episode>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM episodes WHERE outcome_quality IS NOT NULL AND created_at >= $1 ORDER BY created_at",
            EPISODE_COLUMNS
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(episode_from_row).collect()
    }

    async fn list_by_project(&self, project_id: ProjectId, limit: usize) -> Result<Vec<Episode>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM episodes WHERE project_id = $1 ORDER BY created_at DESC LIMIT $2",
            EPISODE_COLUMNS
        ))
        .bind(project_id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(episode_from_row).collect()
    }

    async fn purge(&self, id: EpisodeId) -> Result<(), RepositoryError> {
        // strategy_applications rows go with the episode (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM episodes WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("episode {}", id)));
        }
        Ok(())
    }
}
