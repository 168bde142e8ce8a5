// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Episode Aggregate
//!
//! An episode is the durable record of one decision: the context it was made
//! in, what was decided, the effects taken and, once known, the outcome.
//!
//! ## Embedding lifecycle
//!
//! Episodes are written with an embedding when the embedding provider answers
//! in time. Otherwise they are written with `requires_embedding = true` and
//! picked up later by the backfill job. Pending episodes are visible to audit
//! queries but never to similarity search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::context::ApplicabilityContext;
use super::decision::{BaselineDecision, DecisionSource, ProjectId, RecommendedAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpisodeId(pub Uuid);

impl EpisodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EpisodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeType {
    #[default]
    OrchestrationDecision,
    SprintPlanning,
    Retrospective,
}

impl EpisodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeType::OrchestrationDecision => "orchestration_decision",
            EpisodeType::SprintPlanning => "sprint_planning",
            EpisodeType::Retrospective => "retrospective",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "orchestration_decision" => Some(EpisodeType::OrchestrationDecision),
            "sprint_planning" => Some(EpisodeType::SprintPlanning),
            "retrospective" => Some(EpisodeType::Retrospective),
            _ => None,
        }
    }
}

/// What was decided for this episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDecision {
    pub rule_based: BaselineDecision,
    pub final_decision: BaselineDecision,
    pub decision_source: DecisionSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub project_id: ProjectId,
    pub episode_type: EpisodeType,
    pub timestamp: DateTime<Utc>,
    pub context: ApplicabilityContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    pub summary: String,
    pub decision: EpisodeDecision,
    pub actions: Vec<RecommendedAction>,
    /// Snapshot of the pattern analysis at decision time.
    #[serde(default)]
    pub patterns: serde_json::Value,
    #[serde(default)]
    pub outcome: Option<serde_json::Value>,
    #[serde(default)]
    pub outcome_quality: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub requires_embedding: bool,
}

impl Episode {
    pub fn new(
        project_id: ProjectId,
        episode_type: EpisodeType,
        context: ApplicabilityContext,
        decision: EpisodeDecision,
        actions: Vec<RecommendedAction>,
    ) -> Self {
        let summary = summarize(&context, &decision);
        Self {
            id: EpisodeId::new(),
            project_id,
            episode_type,
            timestamp: Utc::now(),
            context,
            narrative: None,
            summary,
            decision,
            actions,
            patterns: serde_json::Value::Null,
            outcome: None,
            outcome_quality: None,
            embedding: None,
            requires_embedding: true,
        }
    }

    pub fn with_narrative(mut self, narrative: Option<String>) -> Self {
        self.narrative = narrative;
        self
    }

    pub fn with_patterns(mut self, patterns: serde_json::Value) -> Self {
        self.patterns = patterns;
        self
    }

    /// Input for the embedding provider; identical to the query text a
    /// decision request with the same context produces.
    pub fn embedding_text(&self) -> String {
        self.context.embedding_text(self.narrative.as_deref())
    }

    pub fn attach_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = Some(embedding);
        self.requires_embedding = false;
    }

    /// Record the outcome. Quality is clamped into [0,1].
    pub fn record_outcome(&mut self, outcome: serde_json::Value, quality: f64) {
        self.outcome = Some(outcome);
        self.outcome_quality = Some(clamp_quality(quality));
    }

    /// Action taken for `field`, if any.
    pub fn action_for(&self, field: super::decision::DecisionField) -> Option<&RecommendedAction> {
        self.actions.iter().find(|a| a.field == field)
    }

    pub fn is_searchable(&self) -> bool {
        !self.requires_embedding && self.embedding.is_some()
    }
}

/// Clamp an outcome quality into [0,1]. NaN maps to 0.
pub fn clamp_quality(quality: f64) -> f64 {
    if quality.is_nan() {
        0.0
    } else {
        quality.clamp(0.0, 1.0)
    }
}

fn summarize(context: &ApplicabilityContext, decision: &EpisodeDecision) -> String {
    format!(
        "[{}] tasks {} -> {}, duration {}d -> {}d ({})",
        context.embedding_text(None),
        decision.rule_based.task_count,
        decision.final_decision.task_count,
        decision.rule_based.duration_days,
        decision.final_decision.duration_days,
        decision.decision_source,
    )
}

/// Episode returned by similarity search.
#[derive(Debug, Clone)]
pub struct ScoredEpisode {
    pub episode: Episode,
    pub similarity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::DecisionField;

    fn episode() -> Episode {
        let baseline = BaselineDecision { task_count: 8, duration_days: 10 };
        Episode::new(
            ProjectId::new(),
            EpisodeType::SprintPlanning,
            ApplicabilityContext { team_size: Some(5), ..Default::default() },
            EpisodeDecision {
                rule_based: baseline,
                final_decision: baseline.with(DecisionField::TaskCount, 6.0),
                decision_source: DecisionSource::IntelligenceEnhanced,
            },
            vec![RecommendedAction::absolute(DecisionField::TaskCount, 6.0)],
        )
    }

    #[test]
    fn test_new_episode_requires_embedding() {
        let ep = episode();
        assert!(ep.requires_embedding);
        assert!(!ep.is_searchable());
        assert!(ep.summary.contains("tasks 8 -> 6"));
    }

    #[test]
    fn test_attach_embedding_clears_flag() {
        let mut ep = episode();
        ep.attach_embedding(vec![0.1, 0.2]);
        assert!(!ep.requires_embedding);
        assert!(ep.is_searchable());
    }

    #[test]
    fn test_outcome_quality_is_clamped() {
        let mut ep = episode();
        ep.record_outcome(serde_json::json!({"delivered": 7}), 1.4);
        assert_eq!(ep.outcome_quality, Some(1.0));
        ep.record_outcome(serde_json::json!({}), -0.2);
        assert_eq!(ep.outcome_quality, Some(0.0));
        assert_eq!(clamp_quality(f64::NAN), 0.0);
    }

    #[test]
    fn test_action_for_field() {
        let ep = episode();
        assert!(ep.action_for(DecisionField::TaskCount).is_some());
        assert!(ep.action_for(DecisionField::DurationDays).is_none());
    }

    #[test]
    fn test_episode_type_round_trip() {
        for t in [EpisodeType::OrchestrationDecision, EpisodeType::SprintPlanning, EpisodeType::Retrospective] {
            assert_eq!(EpisodeType::parse(t.as_str()), Some(t));
        }
    }
}
