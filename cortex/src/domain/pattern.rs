// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Evidence and Pattern Sets
//!
//! Every knowledge source feeding the combiner is reduced to the same shape,
//! an [`EvidenceSignal`] of `(recommendation, confidence, evidence_size)`,
//! wrapped in an [`Evidence`] variant that keeps its provenance.
//!
//! The combiner folds the evidence for each decision field into a
//! [`FieldPattern`]; the set of field patterns is the [`PatternSet`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::decision::{DecisionField, RecommendedAction};
use super::episode::EpisodeId;
use super::strategy::StrategyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    Strategy,
    Episode,
    Analytics,
}

impl EvidenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceSource::Strategy => "strategy",
            EvidenceSource::Episode => "episode",
            EvidenceSource::Analytics => "analytics",
        }
    }
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSignal {
    pub recommendation: RecommendedAction,
    /// Source confidence in [0,1].
    pub confidence: f64,
    /// Number of observations behind the recommendation.
    pub evidence_size: usize,
}

impl EvidenceSignal {
    pub fn new(recommendation: RecommendedAction, confidence: f64, evidence_size: usize) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Self { recommendation, confidence, evidence_size }
    }

    /// Unnormalized combination weight.
    pub fn raw_weight(&self) -> f64 {
        self.confidence * self.evidence_size as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Evidence {
    Strategy {
        strategy_id: StrategyId,
        applicability_score: f64,
        strategy_confidence: f64,
        signal: EvidenceSignal,
    },
    Episode {
        episode_ids: Vec<EpisodeId>,
        average_quality: f64,
        signal: EvidenceSignal,
    },
    Analytics {
        reference: Option<String>,
        signal: EvidenceSignal,
    },
}

impl Evidence {
    pub fn source(&self) -> EvidenceSource {
        match self {
            Evidence::Strategy { .. } => EvidenceSource::Strategy,
            Evidence::Episode { .. } => EvidenceSource::Episode,
            Evidence::Analytics { .. } => EvidenceSource::Analytics,
        }
    }

    pub fn signal(&self) -> &EvidenceSignal {
        match self {
            Evidence::Strategy { signal, .. }
            | Evidence::Episode { signal, .. }
            | Evidence::Analytics { signal, .. } => signal,
        }
    }

    pub fn field(&self) -> DecisionField {
        self.signal().recommendation.field
    }
}

/// Evidence with its normalized weight and the value it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEvidence {
    pub evidence: Evidence,
    pub weight: f64,
    pub resolved_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPattern {
    pub field: DecisionField,
    pub recommended_value: f64,
    pub combined_confidence: f64,
    /// Episodes + strategy support + analytics sample size, across all
    /// sources that spoke about this field.
    pub evidence_volume: usize,
    pub dominant_source: EvidenceSource,
    pub strategy_dominated: bool,
    /// Evidence that determined the recommended value.
    pub contributions: Vec<WeightedEvidence>,
    /// Evidence recorded for corroboration only (when a strategy dominated).
    pub corroboration: Vec<Evidence>,
}

impl FieldPattern {
    fn all_evidence(&self) -> impl Iterator<Item = &Evidence> {
        self.contributions
            .iter()
            .map(|w| &w.evidence)
            .chain(self.corroboration.iter())
    }

    pub fn strategy_ids(&self) -> Vec<StrategyId> {
        self.contributions
            .iter()
            .filter_map(|w| match &w.evidence {
                Evidence::Strategy { strategy_id, .. } => Some(*strategy_id),
                _ => None,
            })
            .collect()
    }

    pub fn episode_ids(&self) -> Vec<EpisodeId> {
        let mut ids: Vec<EpisodeId> = self
            .all_evidence()
            .filter_map(|e| match e {
                Evidence::Episode { episode_ids, .. } => Some(episode_ids.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn analytics_reference(&self) -> Option<String> {
        self.all_evidence().find_map(|e| match e {
            Evidence::Analytics { reference, .. } => reference.clone(),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternSet {
    pub fields: BTreeMap<DecisionField, FieldPattern>,
    /// Highest field confidence; 0 when no source produced evidence.
    pub combined_confidence: f64,
    pub dominant_source: Option<EvidenceSource>,
}

impl PatternSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: BTreeMap<DecisionField, FieldPattern>) -> Self {
        let best = fields
            .values()
            .max_by(|a, b| a.combined_confidence.total_cmp(&b.combined_confidence));
        let combined_confidence = best.map(|p| p.combined_confidence).unwrap_or(0.0);
        let dominant_source = best.map(|p| p.dominant_source);
        Self { fields, combined_confidence, dominant_source }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// False means "no adjustment proposed".
    pub fn proposes_adjustment(&self) -> bool {
        !self.is_empty() && self.combined_confidence > 0.0
    }

    pub fn get(&self, field: DecisionField) -> Option<&FieldPattern> {
        self.fields.get(&field)
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// A knowledge source could not contribute to a decision. Never surfaces to
/// the caller; the source degrades to zero confidence.
#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("{origin} evidence timed out after {elapsed_ms}ms")]
    Timeout { origin: EvidenceSource, elapsed_ms: u64 },

    #[error("{origin} evidence unavailable: {message}")]
    Unavailable { origin: EvidenceSource, message: String },

    #[error("{0} evidence cancelled")]
    Cancelled(EvidenceSource),
}

impl EvidenceError {
    pub fn origin(&self) -> EvidenceSource {
        match self {
            EvidenceError::Timeout { origin, .. } | EvidenceError::Unavailable { origin, .. } => *origin,
            EvidenceError::Cancelled(origin) => *origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(field: DecisionField, confidence: f64, source: EvidenceSource) -> FieldPattern {
        FieldPattern {
            field,
            recommended_value: 6.0,
            combined_confidence: confidence,
            evidence_volume: 3,
            dominant_source: source,
            strategy_dominated: false,
            contributions: vec![],
            corroboration: vec![],
        }
    }

    #[test]
    fn test_signal_confidence_is_clamped() {
        let action = RecommendedAction::absolute(DecisionField::TaskCount, 6.0);
        assert_eq!(EvidenceSignal::new(action, 3.0, 2).confidence, 1.0);
        assert_eq!(EvidenceSignal::new(action, f64::NAN, 2).confidence, 0.0);
        assert_eq!(EvidenceSignal::new(action, 0.5, 4).raw_weight(), 2.0);
    }

    #[test]
    fn test_empty_pattern_set_proposes_nothing() {
        let set = PatternSet::empty();
        assert!(!set.proposes_adjustment());
        assert_eq!(set.combined_confidence, 0.0);
        assert_eq!(set.dominant_source, None);
    }

    #[test]
    fn test_pattern_set_reports_strongest_field() {
        let mut fields = BTreeMap::new();
        fields.insert(DecisionField::TaskCount, pattern(DecisionField::TaskCount, 0.6, EvidenceSource::Episode));
        fields.insert(DecisionField::DurationDays, pattern(DecisionField::DurationDays, 0.8, EvidenceSource::Strategy));
        let set = PatternSet::from_fields(fields);
        assert_eq!(set.combined_confidence, 0.8);
        assert_eq!(set.dominant_source, Some(EvidenceSource::Strategy));
        assert!(set.proposes_adjustment());
    }

    #[test]
    fn test_evidence_serializes_with_source_tag() {
        let evidence = Evidence::Analytics {
            reference: Some("velocity-90d".to_string()),
            signal: EvidenceSignal::new(RecommendedAction::absolute(DecisionField::TaskCount, 6.0), 0.7, 40),
        };
        let json = serde_json::to_value(&evidence).unwrap();
        assert_eq!(json["source"], "analytics");
        assert_eq!(evidence.source(), EvidenceSource::Analytics);
        assert_eq!(evidence.field(), DecisionField::TaskCount);
    }
}
