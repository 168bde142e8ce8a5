// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helm_cortex::application::{CortexRepositories, CortexRuntime};
use helm_cortex::domain::{
    ApplicabilityContext, BaselineDecision, CortexConfig, DecisionField, DecisionRequest, DecisionResponse,
    DecisionSource, EmbeddingError, EmbeddingProvider, Episode, EpisodeDecision, EpisodeId, EpisodeRepository,
    EpisodeType, LearningUpdate, ProjectId, ProjectPhase, RecommendedAction, RepositoryError, ScoredEpisode,
    Strategy, StrategyId, StrategyMatch, StrategyRepository, VelocityTrend,
};
use helm_cortex::infrastructure::{HashEmbeddingClient, InMemoryCortexStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DIMENSIONS: usize = 64;

pub const BASELINE: BaselineDecision = BaselineDecision { task_count: 8, duration_days: 10 };

pub fn sprint_context() -> ApplicabilityContext {
    ApplicabilityContext {
        team_size: Some(5),
        velocity_trend: Some(VelocityTrend::Decreasing),
        project_phase: Some(ProjectPhase::Execution),
        backlog_size: Some(40),
        sprint_length_days: Some(14),
    }
}

pub fn request(project_id: ProjectId) -> DecisionRequest {
    DecisionRequest::new(project_id, BASELINE, sprint_context())
}

pub fn runtime(store: &InMemoryCortexStore) -> CortexRuntime {
    runtime_with(CortexRepositories::in_memory(store.clone()), Arc::new(HashEmbeddingClient::new(DIMENSIONS)))
}

pub fn runtime_with(repositories: CortexRepositories, embedder: Arc<dyn EmbeddingProvider>) -> CortexRuntime {
    CortexRuntime::from_parts(CortexConfig::default(), repositories, embedder, None)
}

/// Embedded episode in `sprint_context()` that planned `tasks` and finished
/// with `quality`.
pub async fn seed_episode(store: &InMemoryCortexStore, tasks: u32, quality: f64) -> Episode {
    let embedder = HashEmbeddingClient::new(DIMENSIONS);
    let final_decision = BaselineDecision { task_count: tasks, ..BASELINE };
    let mut episode = Episode::new(
        ProjectId::new(),
        EpisodeType::SprintPlanning,
        sprint_context(),
        EpisodeDecision {
            rule_based: BASELINE,
            final_decision,
            decision_source: DecisionSource::IntelligenceEnhanced,
        },
        DecisionField::ALL
            .into_iter()
            .map(|field| RecommendedAction::absolute(field, final_decision.get(field)))
            .collect(),
    );
    episode.attach_embedding(embedder.embed_sync(&episode.embedding_text()));
    episode.record_outcome(serde_json::json!({ "completed": tasks }), quality);
    store.put(&episode).await.expect("seed episode");
    episode
}

/// Every applied adjustment must have cleared the default gate.
pub fn assert_gate_invariant(response: &DecisionResponse) {
    let config = CortexConfig::default();
    for (field, adjustment) in response.accepted_adjustments() {
        assert!(
            adjustment.confidence >= config.gate.confidence_threshold,
            "{} applied with confidence {}",
            field,
            adjustment.confidence
        );
        assert!(
            adjustment.evidence_volume >= config.gate.min_evidence,
            "{} applied with evidence {}",
            field,
            adjustment.evidence_volume
        );
    }
}

/// Poll until `check` holds or a second has passed.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Embedding provider that can be switched off.
pub struct SwitchableEmbedder {
    inner: HashEmbeddingClient,
    up: AtomicBool,
}

impl SwitchableEmbedder {
    pub fn new(up: bool) -> Self {
        Self {
            inner: HashEmbeddingClient::new(DIMENSIONS),
            up: AtomicBool::new(up),
        }
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for SwitchableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.up.load(Ordering::SeqCst) {
            Ok(self.inner.embed_sync(text))
        } else {
            Err(EmbeddingError::Network("connection refused".into()))
        }
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

/// Store whose every call fails.
pub struct DownStore;

fn down() -> RepositoryError {
    RepositoryError::Database("connection refused".into())
}

#[async_trait]
impl EpisodeRepository for DownStore {
    async fn put(&self, _episode: &Episode) -> Result<EpisodeId, RepositoryError> {
        Err(down())
    }
    async fn get(&self, _id: EpisodeId) -> Result<Option<Episode>, RepositoryError> {
        Err(down())
    }
    async fn get_similar(&self, _vector: &[f32], _k: usize) -> Result<Vec<ScoredEpisode>, RepositoryError> {
        Err(down())
    }
    async fn update_outcome(&self, _id: EpisodeId, _outcome: serde_json::Value, _quality: f64) -> Result<(), RepositoryError> {
        Err(down())
    }
    async fn attach_embedding(&self, _id: EpisodeId, _embedding: Vec<f32>) -> Result<(), RepositoryError> {
        Err(down())
    }
    async fn list_pending_embedding(&self, _since: DateTime<Utc>) -> Result<Vec<Episode>, RepositoryError> {
        Err(down())
    }
    async fn list_with_outcome_since(&self, _since: DateTime<Utc>) -> Result<Vec<Episode>, RepositoryError> {
        Err(down())
    }
    async fn list_by_project(&self, _project_id: ProjectId, _limit: usize) -> Result<Vec<Episode>, RepositoryError> {
        Err(down())
    }
    async fn purge(&self, _id: EpisodeId) -> Result<(), RepositoryError> {
        Err(down())
    }
}

#[async_trait]
impl StrategyRepository for DownStore {
    async fn upsert(&self, _strategy: &Strategy) -> Result<(), RepositoryError> {
        Err(down())
    }
    async fn update_evidence(&self, _strategy: &Strategy) -> Result<(), RepositoryError> {
        Err(down())
    }
    async fn apply_learning(&self, _id: StrategyId, _update: &LearningUpdate) -> Result<(), RepositoryError> {
        Err(down())
    }
    async fn get(&self, _id: StrategyId) -> Result<Option<Strategy>, RepositoryError> {
        Err(down())
    }
    async fn find_by_signature(&self, _signature: &str) -> Result<Option<Strategy>, RepositoryError> {
        Err(down())
    }
    async fn find_applicable(
        &self,
        _context: &ApplicabilityContext,
        _min_confidence: f64,
    ) -> Result<Vec<StrategyMatch>, RepositoryError> {
        Err(down())
    }
    async fn list_active(&self) -> Result<Vec<Strategy>, RepositoryError> {
        Err(down())
    }
    async fn deactivate(&self, _id: StrategyId) -> Result<(), RepositoryError> {
        Err(down())
    }
    async fn record_application(&self, _id: StrategyId, _applied_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        Err(down())
    }
}

/// Store whose reads never answer within any sensible timeout.
pub struct StalledStore;

const STALL: Duration = Duration::from_secs(30);

#[async_trait]
impl EpisodeRepository for StalledStore {
    async fn put(&self, episode: &Episode) -> Result<EpisodeId, RepositoryError> {
        Ok(episode.id)
    }
    async fn get(&self, _id: EpisodeId) -> Result<Option<Episode>, RepositoryError> {
        Ok(None)
    }
    async fn get_similar(&self, _vector: &[f32], _k: usize) -> Result<Vec<ScoredEpisode>, RepositoryError> {
        tokio::time::sleep(STALL).await;
        Ok(vec![])
    }
    async fn update_outcome(&self, _id: EpisodeId, _outcome: serde_json::Value, _quality: f64) -> Result<(), RepositoryError> {
        Ok(())
    }
    async fn attach_embedding(&self, _id: EpisodeId, _embedding: Vec<f32>) -> Result<(), RepositoryError> {
        Ok(())
    }
    async fn list_pending_embedding(&self, _since: DateTime<Utc>) -> Result<Vec<Episode>, RepositoryError> {
        Ok(vec![])
    }
    async fn list_with_outcome_since(&self, _since: DateTime<Utc>) -> Result<Vec<Episode>, RepositoryError> {
        Ok(vec![])
    }
    async fn list_by_project(&self, _project_id: ProjectId, _limit: usize) -> Result<Vec<Episode>, RepositoryError> {
        Ok(vec![])
    }
    async fn purge(&self, _id: EpisodeId) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl StrategyRepository for StalledStore {
    async fn upsert(&self, _strategy: &Strategy) -> Result<(), RepositoryError> {
        Ok(())
    }
    async fn update_evidence(&self, _strategy: &Strategy) -> Result<(), RepositoryError> {
        Ok(())
    }
    async fn apply_learning(&self, _id: StrategyId, _update: &LearningUpdate) -> Result<(), RepositoryError> {
        Ok(())
    }
    async fn get(&self, _id: StrategyId) -> Result<Option<Strategy>, RepositoryError> {
        Ok(None)
    }
    async fn find_by_signature(&self, _signature: &str) -> Result<Option<Strategy>, RepositoryError> {
        Ok(None)
    }
    async fn find_applicable(
        &self,
        _context: &ApplicabilityContext,
        _min_confidence: f64,
    ) -> Result<Vec<StrategyMatch>, RepositoryError> {
        tokio::time::sleep(STALL).await;
        Ok(vec![])
    }
    async fn list_active(&self) -> Result<Vec<Strategy>, RepositoryError> {
        Ok(vec![])
    }
    async fn deactivate(&self, _id: StrategyId) -> Result<(), RepositoryError> {
        Ok(())
    }
    async fn record_application(&self, _id: StrategyId, _applied_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        Ok(())
    }
}
