// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Strategy application records (the performance log).
//!
//! A record is written when a strategy-backed adjustment passes the gate and
//! is completed once the episode outcome is known. Each record belongs to
//! exactly one strategy and one episode and is removed with either.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decision::{DecisionField, ProjectId, RecommendedAction};
use super::episode::{clamp_quality, EpisodeId};
use super::strategy::StrategyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationRecordId(pub Uuid);

impl ApplicationRecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ApplicationRecordId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedOutcome {
    pub field: DecisionField,
    pub action: RecommendedAction,
    pub recommended_value: f64,
    /// Quality the strategy is expected to deliver.
    pub expected_quality: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyApplicationRecord {
    pub id: ApplicationRecordId,
    pub strategy_id: StrategyId,
    pub episode_id: EpisodeId,
    pub project_id: ProjectId,
    pub applied_at: DateTime<Utc>,
    pub predicted_outcome: PredictedOutcome,
    pub actual_outcome: Option<serde_json::Value>,
    pub outcome_quality: Option<f64>,
    pub strategy_confidence_at_application: f64,
    pub context_similarity: Option<f64>,
    pub performance_delta: Option<f64>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Set when a learning-optimizer pass claims the resolved record.
    #[serde(default)]
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl StrategyApplicationRecord {
    pub fn new(
        strategy_id: StrategyId,
        episode_id: EpisodeId,
        project_id: ProjectId,
        predicted_outcome: PredictedOutcome,
        strategy_confidence: f64,
        context_similarity: Option<f64>,
    ) -> Self {
        Self {
            id: ApplicationRecordId::new(),
            strategy_id,
            episode_id,
            project_id,
            applied_at: Utc::now(),
            predicted_outcome,
            actual_outcome: None,
            outcome_quality: None,
            strategy_confidence_at_application: clamp_quality(strategy_confidence),
            context_similarity: context_similarity.map(clamp_quality),
            performance_delta: None,
            resolved_at: None,
            evaluated_at: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome_quality.is_some()
    }

    /// Attach the actual outcome and derive the performance delta.
    pub fn resolve(&mut self, actual_outcome: serde_json::Value, quality: f64, resolved_at: DateTime<Utc>) {
        let quality = clamp_quality(quality);
        self.actual_outcome = Some(actual_outcome);
        self.outcome_quality = Some(quality);
        self.performance_delta = Some(quality - self.predicted_outcome.expected_quality);
        self.resolved_at = Some(resolved_at);
    }

    /// Resolved but not yet folded into strategy counters.
    pub fn awaits_evaluation(&self) -> bool {
        self.is_resolved() && self.evaluated_at.is_none()
    }

    /// Whether the resolved outcome counts as a success.
    pub fn is_success(&self, success_threshold: f64) -> Option<bool> {
        self.outcome_quality.map(|q| q >= success_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> StrategyApplicationRecord {
        StrategyApplicationRecord::new(
            StrategyId::new(),
            EpisodeId::new(),
            ProjectId::new(),
            PredictedOutcome {
                field: DecisionField::TaskCount,
                action: RecommendedAction::absolute(DecisionField::TaskCount, 6.0),
                recommended_value: 6.0,
                expected_quality: 0.8,
            },
            1.2,
            Some(0.9),
        )
    }

    #[test]
    fn test_new_record_is_open() {
        let r = record();
        assert!(!r.is_resolved());
        assert_eq!(r.strategy_confidence_at_application, 1.0);
        assert_eq!(r.is_success(0.7), None);
        assert!(!r.awaits_evaluation());
    }

    #[test]
    fn test_resolve_computes_delta() {
        let mut r = record();
        r.resolve(serde_json::json!({"completed": 6}), 0.6, Utc::now());
        assert!(r.is_resolved());
        assert!((r.performance_delta.unwrap() - (-0.2)).abs() < 1e-9);
        assert_eq!(r.is_success(0.7), Some(false));
        assert!(r.resolved_at.is_some());
        assert!(r.awaits_evaluation());
    }
}
