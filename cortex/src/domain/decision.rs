// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Decision Request / Response Contract
//!
//! Types exchanged with the orchestration API. The request carries the
//! rule-based baseline computed by the project services; the response keeps
//! that baseline untouched in `rule_based_decision` and reports every
//! intelligence adjustment, applied or not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::context::ApplicabilityContext;
use super::episode::EpisodeType;
use super::pattern::EvidenceSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A field of the baseline decision that intelligence may adjust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionField {
    TaskCount,
    DurationDays,
}

impl DecisionField {
    pub const ALL: [DecisionField; 2] = [DecisionField::TaskCount, DecisionField::DurationDays];

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionField::TaskCount => "task_count",
            DecisionField::DurationDays => "duration_days",
        }
    }
}

impl fmt::Display for DecisionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target value of a recommended action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionValue {
    /// Set the field to this value.
    Absolute(f64),
    /// Multiply the baseline by this factor (0.75 means "reduce by 25%").
    Relative(f64),
}

/// A concrete effect on one decision field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub field: DecisionField,
    pub value: ActionValue,
}

impl RecommendedAction {
    pub fn absolute(field: DecisionField, value: f64) -> Self {
        Self { field, value: ActionValue::Absolute(value) }
    }

    pub fn relative(field: DecisionField, factor: f64) -> Self {
        Self { field, value: ActionValue::Relative(factor) }
    }

    /// Resolve the action against a baseline value.
    pub fn resolve(&self, baseline: f64) -> f64 {
        match self.value {
            ActionValue::Absolute(v) => v,
            ActionValue::Relative(factor) => baseline * factor,
        }
    }

    /// Grouping key. Values are rounded to two decimals.
    pub fn signature(&self) -> String {
        match self.value {
            ActionValue::Absolute(v) => format!("{}=abs:{:.2}", self.field, v),
            ActionValue::Relative(f) => format!("{}=rel:{:.2}", self.field, f),
        }
    }

    pub fn describe(&self) -> String {
        match self.value {
            ActionValue::Absolute(v) => format!("set {} to {}", self.field, v),
            ActionValue::Relative(f) if f < 1.0 => {
                format!("reduce {} by {:.0}%", self.field, (1.0 - f) * 100.0)
            }
            ActionValue::Relative(f) => {
                format!("increase {} by {:.0}%", self.field, (f - 1.0) * 100.0)
            }
        }
    }
}

/// Decision values produced by the rule engine (and, after gating, the final
/// decision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineDecision {
    pub task_count: u32,
    pub duration_days: u32,
}

impl BaselineDecision {
    pub fn get(&self, field: DecisionField) -> f64 {
        match field {
            DecisionField::TaskCount => self.task_count as f64,
            DecisionField::DurationDays => self.duration_days as f64,
        }
    }

    /// Copy with `field` set to `value`, rounded to the nearest whole unit and
    /// floored at 1.
    pub fn with(mut self, field: DecisionField, value: f64) -> Self {
        let rounded = value.round().max(1.0) as u32;
        match field {
            DecisionField::TaskCount => self.task_count = rounded,
            DecisionField::DurationDays => self.duration_days = rounded,
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub project_id: ProjectId,

    pub baseline: BaselineDecision,

    #[serde(default)]
    pub context: ApplicabilityContext,

    /// Free-text context appended to the embedding input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,

    #[serde(default)]
    pub episode_type: EpisodeType,
}

impl DecisionRequest {
    pub fn new(project_id: ProjectId, baseline: BaselineDecision, context: ApplicabilityContext) -> Self {
        Self {
            project_id,
            baseline,
            context,
            narrative: None,
            episode_type: EpisodeType::default(),
        }
    }

    pub fn embedding_text(&self) -> String {
        self.context.embedding_text(self.narrative.as_deref())
    }
}

/// Where the final decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    RuleBasedOnly,
    IntelligenceEnhanced,
    StrategyEnhanced,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::RuleBasedOnly => "rule_based_only",
            DecisionSource::IntelligenceEnhanced => "intelligence_enhanced",
            DecisionSource::StrategyEnhanced => "strategy_enhanced",
        }
    }
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-field entry of `decisions.intelligence_adjustments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceAdjustment {
    pub original: f64,
    pub recommended: f64,
    pub applied: bool,
    pub confidence: f64,
    pub evidence_source: EvidenceSource,
    pub evidence_volume: usize,
    pub decision_source: DecisionSource,
    pub rationale: String,
    pub gate_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionBlock {
    pub decision_source: DecisionSource,
    pub rule_based_decision: BaselineDecision,
    pub final_decision: BaselineDecision,
    pub intelligence_adjustments: BTreeMap<DecisionField, IntelligenceAdjustment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyContextBlock {
    /// False when the strategy branch timed out or its store failed.
    pub available: bool,
    pub strategies_evaluated: usize,
    pub strategies_applied: usize,
    pub applied_strategy_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeContextBlock {
    /// False when the episode branch timed out or its store failed.
    pub available: bool,
    pub episodes_evaluated: usize,
    pub episodes_applied: usize,
    pub average_similarity: f64,
    pub influence_score: f64,
    pub key_insights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub decision_id: Uuid,
    pub project_id: ProjectId,
    pub decided_at: DateTime<Utc>,
    pub decisions: DecisionBlock,
    pub strategy_context: StrategyContextBlock,
    pub episode_context: EpisodeContextBlock,
    pub analytics_available: bool,
    pub duration_ms: u64,
}

impl DecisionResponse {
    /// The adjustments that passed the confidence gate.
    pub fn accepted_adjustments(&self) -> impl Iterator<Item = (&DecisionField, &IntelligenceAdjustment)> {
        self.decisions
            .intelligence_adjustments
            .iter()
            .filter(|(_, adj)| adj.applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_action_resolves_against_baseline() {
        let action = RecommendedAction::relative(DecisionField::TaskCount, 0.75);
        assert_eq!(action.resolve(8.0), 6.0);
        assert_eq!(action.describe(), "reduce task_count by 25%");
    }

    #[test]
    fn test_action_signature_rounds_values() {
        let a = RecommendedAction::absolute(DecisionField::DurationDays, 10.0);
        let b = RecommendedAction::absolute(DecisionField::DurationDays, 10.001);
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.signature(), "duration_days=abs:10.00");
    }

    #[test]
    fn test_baseline_with_rounds_and_floors() {
        let baseline = BaselineDecision { task_count: 8, duration_days: 10 };
        assert_eq!(baseline.with(DecisionField::TaskCount, 5.6).task_count, 6);
        assert_eq!(baseline.with(DecisionField::DurationDays, 0.2).duration_days, 1);
        assert_eq!(baseline.task_count, 8);
    }

    #[test]
    fn test_decision_source_serialization() {
        let json = serde_json::to_string(&DecisionSource::RuleBasedOnly).unwrap();
        assert_eq!(json, "\"rule_based_only\"");
    }

    #[test]
    fn test_request_defaults() {
        let json = r#"{
            "project_id": "6f9619ff-8b86-d011-b42d-00cf4fc964ff",
            "baseline": { "task_count": 8, "duration_days": 10 }
        }"#;
        let request: DecisionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.baseline.task_count, 8);
        assert!(request.narrative.is_none());
        assert_eq!(request.context, ApplicabilityContext::default());
    }
}
