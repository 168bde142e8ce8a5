// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory cortex store.
//!
//! One struct backs all three repository traits so that purging an episode
//! and dropping its application records happen under the same write lock.
//! Used for development and tests; data is lost on restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::context::ApplicabilityContext;
use crate::domain::decision::ProjectId;
use crate::domain::episode::{clamp_quality, Episode, EpisodeId, ScoredEpisode};
use crate::domain::performance::{ApplicationRecordId, StrategyApplicationRecord};
use crate::domain::repository::{EpisodeRepository, PerformanceLog, RepositoryError, StrategyRepository};
use crate::domain::strategy::{LearningUpdate, Strategy, StrategyId, StrategyMatch};

#[derive(Default)]
struct StoreState {
    episodes: HashMap<EpisodeId, Episode>,
    strategies: HashMap<StrategyId, Strategy>,
    records: HashMap<ApplicationRecordId, StrategyApplicationRecord>,
}

#[derive(Clone, Default)]
pub struct InMemoryCortexStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryCortexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn episode_count(&self) -> usize {
        self.state.read().await.episodes.len()
    }

    pub async fn strategy_count(&self) -> usize {
        self.state.read().await.strategies.len()
    }

    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// All application records, oldest first.
    pub async fn all_records(&self) -> Vec<StrategyApplicationRecord> {
        let mut records: Vec<_> = self.state.read().await.records.values().cloned().collect();
        records.sort_by_key(|r| r.applied_at);
        records
    }
}

/// Cosine similarity of two vectors. Mismatched lengths or a zero vector
/// give 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl EpisodeRepository for InMemoryCortexStore {
    async fn put(&self, episode: &Episode) -> Result<EpisodeId, RepositoryError> {
        self.state.write().await.episodes.insert(episode.id, episode.clone());
        Ok(episode.id)
    }

    async fn get(&self, id: EpisodeId) -> Result<Option<Episode>, RepositoryError> {
        Ok(self.state.read().await.episodes.get(&id).cloned())
    }

    async fn get_similar(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEpisode>, RepositoryError> {
        let state = self.state.read().await;
        let mut scored: Vec<ScoredEpisode> = state
            .episodes
            .values()
            .filter(|e| e.is_searchable())
            .filter_map(|e| {
                let embedding = e.embedding.as_deref()?;
                Some(ScoredEpisode {
                    similarity: cosine_similarity(vector, embedding),
                    episode: e.clone(),
                })
            })
            .collect();

        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(k);
        Ok(scored)
    }

    async fn update_outcome(
        &self,
        id: EpisodeId,
        outcome: serde_json::Value,
        quality: f64,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let episode = state
            .episodes
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("episode {}", id)))?;
        episode.record_outcome(outcome, clamp_quality(quality));
        Ok(())
    }

    async fn attach_embedding(&self, id: EpisodeId, embedding: Vec<f32>) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let episode = state
            .episodes
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("episode {}", id)))?;
        episode.attach_embedding(embedding);
        Ok(())
    }

    async fn list_pending_embedding(&self, since: DateTime<Utc>) -> Result<Vec<Episode>, RepositoryError> {
        let state = self.state.read().await;
        let mut pending: Vec<Episode> = state
            .episodes
            .values()
            .filter(|e| e.requires_embedding && e.timestamp >= since)
            .cloned()
            .collect();
        pending.sort_by_key(|e| e.timestamp);
        Ok(pending)
    }

    async fn list_with_outcome_since(&self, since: DateTime<Utc>) -> Result<Vec<Episode>, RepositoryError> {
        let state = self.state.read().await;
        let mut episodes: Vec<Episode> = state
            .episodes
            .values()
            .filter(|e| e.outcome_quality.is_some() && e.timestamp >= since)
            .cloned()
            .collect();
        episodes.sort_by_key(|e| e.timestamp);
        Ok(episodes)
    }

    async fn list_by_project(&self, project_id: ProjectId, limit: usize) -> Result<Vec<Episode>, RepositoryError> {
        let state = self.state.read().await;
        let mut episodes: Vec<Episode> = state
            .episodes
            .values()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect();
        episodes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        episodes.truncate(limit);
        Ok(episodes)
    }

    async fn purge(&self, id: EpisodeId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.episodes.remove(&id).is_none() {
            return Err(RepositoryError::NotFound(format!("episode {}", id)));
        }
        state.records.retain(|_, r| r.episode_id != id);
        Ok(())
    }
}

#[async_trait]
impl StrategyRepository for InMemoryCortexStore {
    async fn upsert(&self, strategy: &Strategy) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let mut stored = strategy.clone();
        if let Some(existing) = state.strategies.get(&strategy.id) {
            stored.times_applied = existing.times_applied;
            stored.last_applied_at = existing.last_applied_at;
        }
        state.strategies.insert(strategy.id, stored);
        Ok(())
    }

    async fn update_evidence(&self, strategy: &Strategy) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .strategies
            .get_mut(&strategy.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("strategy {}", strategy.id)))?;
        stored.content = strategy.content.clone();
        stored.description = strategy.description.clone();
        stored.set_confidence(strategy.confidence);
        stored.supporting_episodes = strategy.supporting_episodes.clone();
        stored.contradicting_episodes = strategy.contradicting_episodes.clone();
        stored.version = strategy.version;
        Ok(())
    }

    async fn apply_learning(&self, id: StrategyId, update: &LearningUpdate) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .strategies
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("strategy {}", id)))?;
        stored.apply_learning(update);
        Ok(())
    }

    async fn get(&self, id: StrategyId) -> Result<Option<Strategy>, RepositoryError> {
        Ok(self.state.read().await.strategies.get(&id).cloned())
    }

    async fn find_by_signature(&self, signature: &str) -> Result<Option<Strategy>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .strategies
            .values()
            .filter(|s| s.signature() == signature)
            .max_by_key(|s| (s.is_active, s.version))
            .cloned())
    }

    async fn find_applicable(
        &self,
        context: &ApplicabilityContext,
        min_confidence: f64,
    ) -> Result<Vec<StrategyMatch>, RepositoryError> {
        let state = self.state.read().await;
        let mut matches: Vec<StrategyMatch> = state
            .strategies
            .values()
            .filter(|s| s.is_active && s.confidence >= min_confidence)
            .filter_map(|s| {
                s.applicability(context).map(|score| StrategyMatch {
                    strategy: s.clone(),
                    applicability_score: score,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.strategy
                .confidence
                .total_cmp(&a.strategy.confidence)
                .then(b.applicability_score.total_cmp(&a.applicability_score))
        });
        Ok(matches)
    }

    async fn list_active(&self) -> Result<Vec<Strategy>, RepositoryError> {
        let state = self.state.read().await;
        let mut active: Vec<Strategy> = state.strategies.values().filter(|s| s.is_active).cloned().collect();
        active.sort_by_key(|s| s.created_at);
        Ok(active)
    }

    async fn deactivate(&self, id: StrategyId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let strategy = state
            .strategies
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("strategy {}", id)))?;
        strategy.deactivate();
        Ok(())
    }

    async fn record_application(&self, id: StrategyId, applied_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let strategy = state
            .strategies
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("strategy {}", id)))?;
        strategy.record_application(applied_at);
        Ok(())
    }
}

#[async_trait]
impl PerformanceLog for InMemoryCortexStore {
    async fn append(&self, record: &StrategyApplicationRecord) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.strategies.contains_key(&record.strategy_id) {
            return Err(RepositoryError::NotFound(format!("strategy {}", record.strategy_id)));
        }
        if !state.episodes.contains_key(&record.episode_id) {
            return Err(RepositoryError::NotFound(format!("episode {}", record.episode_id)));
        }
        state.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn list_since(
        &self,
        strategy_id: StrategyId,
        since: DateTime<Utc>,
    ) -> Result<Vec<StrategyApplicationRecord>, RepositoryError> {
        let state = self.state.read().await;
        let mut records: Vec<StrategyApplicationRecord> = state
            .records
            .values()
            .filter(|r| r.strategy_id == strategy_id)
            .filter(|r| r.resolved_at.is_some_and(|at| at > since))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.resolved_at);
        Ok(records)
    }

    async fn claim_unevaluated(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<Vec<StrategyApplicationRecord>, RepositoryError> {
        let mut state = self.state.write().await;
        let mut claimed: Vec<StrategyApplicationRecord> = state
            .records
            .values_mut()
            .filter(|r| r.strategy_id == strategy_id && r.awaits_evaluation())
            .map(|r| {
                r.evaluated_at = Some(at);
                r.clone()
            })
            .collect();
        claimed.sort_by_key(|r| r.resolved_at);
        Ok(claimed)
    }

    async fn release_claim(&self, ids: &[ApplicationRecordId]) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        for id in ids {
            if let Some(record) = state.records.get_mut(id) {
                record.evaluated_at = None;
            }
        }
        Ok(())
    }

    async fn list_open_for_episode(&self, episode_id: EpisodeId) -> Result<Vec<StrategyApplicationRecord>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .records
            .values()
            .filter(|r| r.episode_id == episode_id && !r.is_resolved())
            .cloned()
            .collect())
    }

    async fn update(&self, record: &StrategyApplicationRecord) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        match state.records.get_mut(&record.id) {
            Some(existing) => {
                *existing = StrategyApplicationRecord {
                    evaluated_at: existing.evaluated_at,
                    ..record.clone()
                };
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("application record {:?}", record.id))),
        }
    }
}
