// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Repository Interfaces
//!
//! Persistence contracts for the cortex aggregates. Interfaces live in the
//! domain layer and are implemented in `crate::infrastructure`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `EpisodeRepository` | `Episode` | `InMemoryCortexStore`, `PostgresEpisodeRepository` |
//! | `StrategyRepository` | `Strategy` | `InMemoryCortexStore`, `PostgresStrategyRepository` |
//! | `PerformanceLog` | `StrategyApplicationRecord` | `InMemoryCortexStore`, `PostgresPerformanceLog` |
//!
//! Writes are row-atomic: a reader observes a strategy either before or after
//! an optimizer update, never a partial row. The evolution loop writes through
//! column-targeted operations (`update_evidence`, `apply_learning`) so that
//! application counters bumped by live decisions in between are never
//! overwritten.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::ApplicabilityContext;
use super::decision::ProjectId;
use super::episode::{Episode, EpisodeId, ScoredEpisode};
use super::performance::{ApplicationRecordId, StrategyApplicationRecord};
use super::strategy::{LearningUpdate, Strategy, StrategyId, StrategyMatch};

/// Storage backend selected at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageBackend {
    InMemory,
    #[serde(rename = "postgres")]
    PostgreSQL(PostgresConfig),
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::InMemory
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub connection_string: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl PostgresConfig {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
}

fn default_max_connections() -> u32 {
    PostgresConfig::DEFAULT_MAX_CONNECTIONS
}

#[async_trait]
pub trait EpisodeRepository: Send + Sync {
    /// Insert or replace an episode.
    async fn put(&self, episode: &Episode) -> Result<EpisodeId, RepositoryError>;

    async fn get(&self, id: EpisodeId) -> Result<Option<Episode>, RepositoryError>;

    /// Top-`k` embedded episodes by cosine similarity, best first. Episodes
    /// still waiting for an embedding are never returned.
    async fn get_similar(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEpisode>, RepositoryError>;

    /// Attach an outcome. Quality is clamped into [0,1].
    async fn update_outcome(
        &self,
        id: EpisodeId,
        outcome: serde_json::Value,
        quality: f64,
    ) -> Result<(), RepositoryError>;

    /// Attach an embedding and clear `requires_embedding`.
    async fn attach_embedding(&self, id: EpisodeId, embedding: Vec<f32>) -> Result<(), RepositoryError>;

    /// Episodes created at or after `since` that still need an embedding.
    async fn list_pending_embedding(&self, since: DateTime<Utc>) -> Result<Vec<Episode>, RepositoryError>;

    /// Episodes created at or after `since` with a known outcome quality.
    async fn list_with_outcome_since(&self, since: DateTime<Utc>) -> Result<Vec<Episode>, RepositoryError>;

    /// Audit query: most recent episodes of a project, embedded or not.
    async fn list_by_project(&self, project_id: ProjectId, limit: usize) -> Result<Vec<Episode>, RepositoryError>;

    /// Remove an episode and every application record that references it.
    async fn purge(&self, id: EpisodeId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait StrategyRepository: Send + Sync {
    /// Insert, or replace the strategy with the same id. `times_applied` and
    /// `last_applied_at` of an existing row are kept.
    async fn upsert(&self, strategy: &Strategy) -> Result<(), RepositoryError>;

    /// Write the evidence side of a strategy: content, description,
    /// confidence, supporting/contradicting episodes and version.
    async fn update_evidence(&self, strategy: &Strategy) -> Result<(), RepositoryError>;

    /// Add outcome counts and store the new confidence, evaluation time and
    /// activity. A deactivated strategy stays inactive.
    async fn apply_learning(&self, id: StrategyId, update: &LearningUpdate) -> Result<(), RepositoryError>;

    async fn get(&self, id: StrategyId) -> Result<Option<Strategy>, RepositoryError>;

    /// Strategy with the given applicability+action signature, active or not.
    async fn find_by_signature(&self, signature: &str) -> Result<Option<Strategy>, RepositoryError>;

    /// Active strategies with `confidence >= min_confidence` whose predicate
    /// accepts `context`.
    async fn find_applicable(
        &self,
        context: &ApplicabilityContext,
        min_confidence: f64,
    ) -> Result<Vec<StrategyMatch>, RepositoryError>;

    async fn list_active(&self) -> Result<Vec<Strategy>, RepositoryError>;

    async fn deactivate(&self, id: StrategyId) -> Result<(), RepositoryError>;

    /// Bump `times_applied` and `last_applied_at`.
    async fn record_application(&self, id: StrategyId, applied_at: DateTime<Utc>) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PerformanceLog: Send + Sync {
    async fn append(&self, record: &StrategyApplicationRecord) -> Result<(), RepositoryError>;

    /// Records of `strategy_id` resolved strictly after `since`, oldest
    /// first.
    async fn list_since(
        &self,
        strategy_id: StrategyId,
        since: DateTime<Utc>,
    ) -> Result<Vec<StrategyApplicationRecord>, RepositoryError>;

    /// Atomically mark every resolved, not yet evaluated record of
    /// `strategy_id` as evaluated at `at` and return them, oldest resolution
    /// first. A record is returned by exactly one claim.
    async fn claim_unevaluated(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<Vec<StrategyApplicationRecord>, RepositoryError>;

    /// Undo a claim so the records are picked up by the next pass.
    async fn release_claim(&self, ids: &[ApplicationRecordId]) -> Result<(), RepositoryError>;

    /// Records of `episode_id` that have no actual outcome yet.
    async fn list_open_for_episode(&self, episode_id: EpisodeId) -> Result<Vec<StrategyApplicationRecord>, RepositoryError>;

    /// Replace an existing record.
    async fn update(&self, record: &StrategyApplicationRecord) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
