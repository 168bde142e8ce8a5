// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Strategy Matcher
//!
//! Finds active strategies whose applicability predicate accepts the current
//! context. Reads go straight to the strategy store on every request, so a
//! confidence tuned by the optimizer is visible on the next decision.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::domain::config::MatchingConfig;
use crate::domain::context::ApplicabilityContext;
use crate::domain::pattern::{EvidenceError, EvidenceSource};
use crate::domain::repository::StrategyRepository;
use crate::domain::strategy::StrategyMatch;

pub struct StrategyMatcher {
    repository: Arc<dyn StrategyRepository>,
    timeout: Duration,
    max_strategies: usize,
    default_min_confidence: f64,
}

impl StrategyMatcher {
    pub fn new(repository: Arc<dyn StrategyRepository>, config: &MatchingConfig) -> Self {
        Self {
            repository,
            timeout: config.timeout,
            max_strategies: config.max_strategies,
            default_min_confidence: config.min_confidence,
        }
    }

    pub fn default_min_confidence(&self) -> f64 {
        self.default_min_confidence
    }

    /// Matching strategies by descending confidence. Empty on timeout or
    /// store error.
    pub async fn match_strategies(&self, context: &ApplicabilityContext, min_confidence: f64) -> Vec<StrategyMatch> {
        match self.match_detailed(context, min_confidence).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "Strategy matching degraded to empty result");
                Vec::new()
            }
        }
    }

    pub async fn match_detailed(
        &self,
        context: &ApplicabilityContext,
        min_confidence: f64,
    ) -> Result<Vec<StrategyMatch>, EvidenceError> {
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.timeout,
            self.repository.find_applicable(context, min_confidence),
        )
        .await;

        let mut matches = match result {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                return Err(EvidenceError::Unavailable {
                    origin: EvidenceSource::Strategy,
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(EvidenceError::Timeout {
                    origin: EvidenceSource::Strategy,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        };

        // The store contract already filters these; keep the invariant local.
        matches.retain(|m| m.strategy.is_active && m.strategy.confidence >= min_confidence);
        matches.sort_by(|a, b| {
            b.strategy
                .confidence
                .total_cmp(&a.strategy.confidence)
                .then(b.applicability_score.total_cmp(&a.applicability_score))
        });
        matches.truncate(self.max_strategies);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::{ApplicabilityPredicate, VelocityTrend};
    use crate::domain::decision::{DecisionField, RecommendedAction};
    use crate::domain::repository::StrategyRepository as _;
    use crate::domain::strategy::{Strategy, StrategyContent};
    use crate::infrastructure::in_memory_store::InMemoryCortexStore;
    use std::collections::BTreeSet;

    fn strategy(confidence: f64) -> Strategy {
        Strategy::new(
            StrategyContent {
                applicability: ApplicabilityPredicate {
                    velocity_trend: Some(VelocityTrend::Decreasing),
                    ..Default::default()
                },
                action: RecommendedAction::relative(DecisionField::TaskCount, 0.75),
                context_centroid: None,
            },
            "reduce load when velocity drops".to_string(),
            confidence,
            BTreeSet::new(),
        )
    }

    #[tokio::test]
    async fn test_matches_ordered_by_confidence() {
        let store = InMemoryCortexStore::new();
        for confidence in [0.6, 0.9, 0.4, 0.7] {
            store.upsert(&strategy(confidence)).await.unwrap();
        }
        let matcher = StrategyMatcher::new(Arc::new(store), &MatchingConfig::default());
        let context = ApplicabilityContext {
            velocity_trend: Some(VelocityTrend::Decreasing),
            ..Default::default()
        };

        let matches = matcher.match_strategies(&context, 0.5).await;
        let confidences: Vec<f64> = matches.iter().map(|m| m.strategy.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7, 0.6]);
    }

    #[tokio::test]
    async fn test_deactivated_strategy_is_never_matched() {
        let store = InMemoryCortexStore::new();
        let s = strategy(0.9);
        store.upsert(&s).await.unwrap();
        store.deactivate(s.id).await.unwrap();
        let matcher = StrategyMatcher::new(Arc::new(store), &MatchingConfig::default());

        let context = ApplicabilityContext {
            velocity_trend: Some(VelocityTrend::Decreasing),
            ..Default::default()
        };
        assert!(matcher.match_strategies(&context, 0.0).await.is_empty());
    }
}
