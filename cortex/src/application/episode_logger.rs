// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Episode Logger
//!
//! Persists finished decisions in the background. The embedding is
//! best-effort: when the provider fails or times out, the episode is stored
//! with `requires_embedding = true` and picked up later by the backfill job.
//! Store writes are retried with exponential backoff; a write that still
//! fails is logged as a durability warning and never reaches the caller.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::retry::RetryPolicy;
use crate::domain::collaborators::EmbeddingProvider;
use crate::domain::config::LoggerConfig;
use crate::domain::decision::{BaselineDecision, DecisionField, DecisionRequest, DecisionSource, RecommendedAction};
use crate::domain::episode::{Episode, EpisodeDecision, EpisodeId};
use crate::domain::events::CortexEvent;
use crate::domain::performance::{PredictedOutcome, StrategyApplicationRecord};
use crate::domain::repository::{EpisodeRepository, PerformanceLog, RepositoryError, StrategyRepository};
use crate::domain::strategy::StrategyId;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::in_memory_store::cosine_similarity;

/// An accepted adjustment whose evidence included a matched strategy.
#[derive(Debug, Clone)]
pub struct StrategyApplication {
    pub strategy_id: StrategyId,
    pub field: DecisionField,
    pub action: RecommendedAction,
    pub recommended_value: f64,
    pub expected_quality: f64,
    pub strategy_confidence: f64,
    /// Mean embedding of the strategy's training episodes.
    pub context_centroid: Option<Vec<f32>>,
}

/// Everything the logger needs to persist one decision.
#[derive(Debug, Clone)]
pub struct EpisodeLogEntry {
    pub request: DecisionRequest,
    pub final_decision: BaselineDecision,
    pub decision_source: DecisionSource,
    pub patterns: serde_json::Value,
    pub applications: Vec<StrategyApplication>,
}

pub struct EpisodeLogger {
    episodes: Arc<dyn EpisodeRepository>,
    strategies: Arc<dyn StrategyRepository>,
    performance: Arc<dyn PerformanceLog>,
    embedder: Arc<dyn EmbeddingProvider>,
    event_bus: Arc<EventBus>,
    embedding_timeout: Duration,
    retry: RetryPolicy,
}

impl EpisodeLogger {
    pub fn new(
        episodes: Arc<dyn EpisodeRepository>,
        strategies: Arc<dyn StrategyRepository>,
        performance: Arc<dyn PerformanceLog>,
        embedder: Arc<dyn EmbeddingProvider>,
        event_bus: Arc<EventBus>,
        config: &LoggerConfig,
    ) -> Self {
        Self {
            episodes,
            strategies,
            performance,
            embedder,
            event_bus,
            embedding_timeout: config.embedding_timeout,
            retry: RetryPolicy::new(config.max_retries, config.retry_base_delay),
        }
    }

    /// Fire-and-forget: persist `entry` on a background task.
    pub fn submit(self: &Arc<Self>, entry: EpisodeLogEntry) -> JoinHandle<Option<EpisodeId>> {
        let logger = Arc::clone(self);
        tokio::spawn(async move { logger.log(entry).await.ok() })
    }

    pub async fn log(&self, entry: EpisodeLogEntry) -> Result<EpisodeId, RepositoryError> {
        let request = &entry.request;
        let actions = DecisionField::ALL
            .into_iter()
            .map(|field| RecommendedAction::absolute(field, entry.final_decision.get(field)))
            .collect();

        let mut episode = Episode::new(
            request.project_id,
            request.episode_type,
            request.context.clone(),
            EpisodeDecision {
                rule_based: request.baseline,
                final_decision: entry.final_decision,
                decision_source: entry.decision_source,
            },
            actions,
        )
        .with_narrative(request.narrative.clone())
        .with_patterns(entry.patterns.clone());

        let embedding = self.embed(&episode.embedding_text()).await;
        let embedded = embedding.is_some();
        if let Some(vector) = &embedding {
            episode.attach_embedding(vector.clone());
        }

        let stored = self.retry.run("episode_put", || self.episodes.put(&episode)).await;
        let episode_id = match stored {
            Ok(id) => id,
            Err(e) => {
                metrics::counter!("helm_episode_log_failures_total").increment(1);
                error!(
                    project_id = %request.project_id,
                    error = %e,
                    "Durability warning: decision episode could not be persisted"
                );
                return Err(e);
            }
        };

        let mut records = 0;
        for application in &entry.applications {
            if self.record_application(&episode, application, embedding.as_deref()).await {
                records += 1;
            }
        }

        info!(
            episode_id = %episode_id,
            project_id = %request.project_id,
            decision_source = %entry.decision_source,
            embedded,
            application_records = records,
            "Episode logged"
        );
        self.event_bus.publish(CortexEvent::EpisodeLogged {
            episode_id,
            project_id: request.project_id,
            decision_source: entry.decision_source,
            embedded,
            application_records: records,
            timestamp: Utc::now(),
        });

        Ok(episode_id)
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match tokio::time::timeout(self.embedding_timeout, self.embedder.embed(text)).await {
            Ok(Ok(vector)) if !vector.is_empty() => Some(vector),
            Ok(Ok(_)) => {
                warn!("Embedding provider returned an empty vector, episode flagged for backfill");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Embedding unavailable, episode flagged for backfill");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.embedding_timeout.as_millis() as u64,
                    "Embedding timed out, episode flagged for backfill"
                );
                None
            }
        }
    }

    async fn record_application(
        &self,
        episode: &Episode,
        application: &StrategyApplication,
        query_vector: Option<&[f32]>,
    ) -> bool {
        let context_similarity = match (&application.context_centroid, query_vector) {
            (Some(centroid), Some(vector)) if centroid.len() == vector.len() => {
                Some(cosine_similarity(centroid, vector).clamp(0.0, 1.0))
            }
            _ => None,
        };

        let record = StrategyApplicationRecord::new(
            application.strategy_id,
            episode.id,
            episode.project_id,
            PredictedOutcome {
                field: application.field,
                action: application.action,
                recommended_value: application.recommended_value,
                expected_quality: application.expected_quality,
            },
            application.strategy_confidence,
            context_similarity,
        );

        let appended = self
            .retry
            .run("application_append", || self.performance.append(&record))
            .await;
        if let Err(e) = appended {
            metrics::counter!("helm_episode_log_failures_total").increment(1);
            error!(
                strategy_id = %application.strategy_id,
                episode_id = %episode.id,
                error = %e,
                "Durability warning: strategy application record could not be persisted"
            );
            return false;
        }

        let applied_at = record.applied_at;
        let bumped = self
            .retry
            .run("strategy_record_application", || {
                self.strategies.record_application(application.strategy_id, applied_at)
            })
            .await;
        if let Err(e) = bumped {
            warn!(strategy_id = %application.strategy_id, error = %e, "Failed to bump strategy application count");
        }

        debug!(strategy_id = %application.strategy_id, episode_id = %episode.id, "Strategy application recorded");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collaborators::EmbeddingError;
    use crate::domain::context::{ApplicabilityContext, ApplicabilityPredicate};
    use crate::domain::decision::ProjectId;
    use crate::domain::strategy::{Strategy, StrategyContent};
    use crate::infrastructure::embedding_client::HashEmbeddingClient;
    use crate::infrastructure::in_memory_store::InMemoryCortexStore;
    use async_trait::async_trait;
    use std::collections::BTreeSet;

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Network("connection refused".into()))
        }

        fn dimensions(&self) -> usize {
            8
        }
    }

    fn logger(store: &InMemoryCortexStore, embedder: Arc<dyn EmbeddingProvider>, bus: Arc<EventBus>) -> EpisodeLogger {
        EpisodeLogger::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            embedder,
            bus,
            &LoggerConfig::default(),
        )
    }

    fn entry(applications: Vec<StrategyApplication>) -> EpisodeLogEntry {
        let baseline = BaselineDecision { task_count: 8, duration_days: 10 };
        EpisodeLogEntry {
            request: DecisionRequest::new(ProjectId::new(), baseline, ApplicabilityContext::default()),
            final_decision: baseline.with(DecisionField::TaskCount, 6.0),
            decision_source: DecisionSource::StrategyEnhanced,
            patterns: serde_json::json!({}),
            applications,
        }
    }

    #[tokio::test]
    async fn test_embedded_episode_is_searchable() {
        let store = InMemoryCortexStore::new();
        let bus = Arc::new(EventBus::with_default_capacity());
        let mut events = bus.subscribe();
        let logger = logger(&store, Arc::new(HashEmbeddingClient::new(16)), bus);

        let id = logger.log(entry(vec![])).await.unwrap();
        let episode = EpisodeRepository::get(&store, id).await.unwrap().unwrap();

        assert!(episode.is_searchable());
        assert_eq!(episode.actions.len(), 2);
        assert_eq!(episode.decision.final_decision.task_count, 6);
        assert!(matches!(
            events.try_recv().unwrap(),
            CortexEvent::EpisodeLogged { embedded: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_embedding_failure_flags_for_backfill() {
        let store = InMemoryCortexStore::new();
        let logger = logger(&store, Arc::new(FailingEmbedder), Arc::new(EventBus::with_default_capacity()));

        let id = logger.log(entry(vec![])).await.unwrap();
        let episode = EpisodeRepository::get(&store, id).await.unwrap().unwrap();

        assert!(episode.requires_embedding);
        assert!(episode.embedding.is_none());
        assert!(store.get_similar(&[1.0; 8], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_strategy_application_is_recorded() {
        let store = InMemoryCortexStore::new();
        let strategy = Strategy::new(
            StrategyContent {
                applicability: ApplicabilityPredicate::default(),
                action: RecommendedAction::relative(DecisionField::TaskCount, 0.75),
                context_centroid: None,
            },
            "reduce".into(),
            0.8,
            BTreeSet::new(),
        );
        store.upsert(&strategy).await.unwrap();
        let logger = logger(&store, Arc::new(HashEmbeddingClient::new(16)), Arc::new(EventBus::with_default_capacity()));

        let application = StrategyApplication {
            strategy_id: strategy.id,
            field: DecisionField::TaskCount,
            action: strategy.content.action,
            recommended_value: 6.0,
            expected_quality: 0.8,
            strategy_confidence: 0.8,
            context_centroid: None,
        };
        let id = logger.log(entry(vec![application])).await.unwrap();

        let records = store.list_open_for_episode(id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].actual_outcome.is_none());
        assert_eq!(records[0].predicted_outcome.recommended_value, 6.0);

        let stored = StrategyRepository::get(&store, strategy.id).await.unwrap().unwrap();
        assert_eq!(stored.times_applied, 1);
        assert!(stored.last_applied_at.is_some());
    }
}
