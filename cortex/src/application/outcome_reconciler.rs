// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Outcome Reconciler
//!
//! Attaches a real-world outcome to an episode and resolves every open
//! strategy application record that references it. Strategy counters are
//! left to the learning optimizer, which claims resolved records one by one.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::episode::{clamp_quality, EpisodeId};
use crate::domain::events::CortexEvent;
use crate::domain::repository::{EpisodeRepository, PerformanceLog};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeSummary {
    pub episode_id: EpisodeId,
    pub outcome_quality: f64,
    pub records_resolved: usize,
}

pub struct OutcomeReconciler {
    episodes: Arc<dyn EpisodeRepository>,
    performance: Arc<dyn PerformanceLog>,
    event_bus: Arc<EventBus>,
}

impl OutcomeReconciler {
    pub fn new(
        episodes: Arc<dyn EpisodeRepository>,
        performance: Arc<dyn PerformanceLog>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            episodes,
            performance,
            event_bus,
        }
    }

    pub async fn record_outcome(
        &self,
        episode_id: EpisodeId,
        outcome: serde_json::Value,
        quality: f64,
    ) -> Result<OutcomeSummary> {
        let quality = clamp_quality(quality);

        self.episodes
            .update_outcome(episode_id, outcome.clone(), quality)
            .await
            .with_context(|| format!("Failed to record outcome for episode {}", episode_id))?;

        let open = self
            .performance
            .list_open_for_episode(episode_id)
            .await
            .context("Failed to list open application records")?;

        let resolved_at = Utc::now();
        let mut records_resolved = 0;
        for mut record in open {
            record.resolve(outcome.clone(), quality, resolved_at);
            match self.performance.update(&record).await {
                Ok(()) => records_resolved += 1,
                Err(e) => warn!(
                    record_id = %record.id.0,
                    strategy_id = %record.strategy_id,
                    error = %e,
                    "Failed to resolve application record"
                ),
            }
        }

        info!(episode_id = %episode_id, quality, records_resolved, "Outcome recorded");
        self.event_bus.publish(CortexEvent::OutcomeRecorded {
            episode_id,
            outcome_quality: quality,
            records_resolved,
            timestamp: resolved_at,
        });

        Ok(OutcomeSummary {
            episode_id,
            outcome_quality: quality,
            records_resolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::{ApplicabilityContext, ApplicabilityPredicate};
    use crate::domain::decision::{BaselineDecision, DecisionField, DecisionSource, ProjectId, RecommendedAction};
    use crate::domain::episode::{Episode, EpisodeDecision, EpisodeType};
    use crate::domain::performance::{PredictedOutcome, StrategyApplicationRecord};
    use crate::domain::repository::StrategyRepository;
    use crate::domain::strategy::{Strategy, StrategyContent};
    use crate::infrastructure::in_memory_store::InMemoryCortexStore;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_outcome_resolves_open_records() {
        let store = InMemoryCortexStore::new();
        let baseline = BaselineDecision { task_count: 8, duration_days: 10 };
        let episode = Episode::new(
            ProjectId::new(),
            EpisodeType::SprintPlanning,
            ApplicabilityContext::default(),
            EpisodeDecision {
                rule_based: baseline,
                final_decision: baseline,
                decision_source: DecisionSource::StrategyEnhanced,
            },
            vec![],
        );
        store.put(&episode).await.unwrap();
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
        let record = StrategyApplicationRecord::new(
            strategy.id,
            episode.id,
            episode.project_id,
            PredictedOutcome {
                field: DecisionField::TaskCount,
                action: strategy.content.action,
                recommended_value: 6.0,
                expected_quality: 0.8,
            },
            0.8,
            None,
        );
        store.append(&record).await.unwrap();

        let reconciler = OutcomeReconciler::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(EventBus::with_default_capacity()),
        );
        let summary = reconciler
            .record_outcome(episode.id, serde_json::json!({"completed": 6}), 1.4)
            .await
            .unwrap();

        assert_eq!(summary.outcome_quality, 1.0);
        assert_eq!(summary.records_resolved, 1);
        assert!(store.list_open_for_episode(episode.id).await.unwrap().is_empty());

        let resolved = &store.all_records().await[0];
        assert_eq!(resolved.outcome_quality, Some(1.0));
        assert!((resolved.performance_delta.unwrap() - 0.2).abs() < 1e-9);

        // counters are the optimizer's job
        let stored = StrategyRepository::get(&store, strategy.id).await.unwrap().unwrap();
        assert_eq!(stored.observed_outcomes(), 0);
    }

    #[tokio::test]
    async fn test_unknown_episode_is_an_error() {
        let store = InMemoryCortexStore::new();
        let reconciler = OutcomeReconciler::new(
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(EventBus::with_default_capacity()),
        );
        assert!(reconciler
            .record_outcome(EpisodeId::new(), serde_json::json!({}), 0.5)
            .await
            .is_err());
    }
}
