// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Decision Modifier
//!
//! Turns each field pattern into a [`ProposedAdjustment`] against the
//! baseline. Recommended values are rounded to whole units; a change must
//! exceed the absolute threshold and reach the relative threshold to be
//! proposed.

use crate::domain::adjustment::{EvidenceReferences, ProposedAdjustment};
use crate::domain::config::ModifierConfig;
use crate::domain::decision::{BaselineDecision, DecisionField};
use crate::domain::pattern::{Evidence, FieldPattern, PatternSet};

pub struct DecisionModifier {
    min_absolute_change: f64,
    min_relative_change: f64,
}

impl DecisionModifier {
    pub fn new(config: &ModifierConfig) -> Self {
        Self {
            min_absolute_change: config.min_absolute_change,
            min_relative_change: config.min_relative_change,
        }
    }

    /// Proposals for every field whose pattern recommends a material change.
    pub fn propose(&self, baseline: &BaselineDecision, patterns: &PatternSet) -> Vec<ProposedAdjustment> {
        if !patterns.proposes_adjustment() {
            return Vec::new();
        }
        DecisionField::ALL
            .into_iter()
            .filter_map(|field| {
                let pattern = patterns.get(field)?;
                self.propose_field(baseline, pattern)
            })
            .collect()
    }

    fn propose_field(&self, baseline: &BaselineDecision, pattern: &FieldPattern) -> Option<ProposedAdjustment> {
        if pattern.combined_confidence <= 0.0 {
            return None;
        }

        let original = baseline.get(pattern.field);
        let recommended = baseline.with(pattern.field, pattern.recommended_value).get(pattern.field);
        if !self.is_material(original, recommended) {
            return None;
        }

        Some(ProposedAdjustment {
            field: pattern.field,
            original,
            recommended,
            confidence: pattern.combined_confidence,
            evidence_volume: pattern.evidence_volume,
            dominant_source: pattern.dominant_source,
            rationale: rationale(pattern, original, recommended),
            evidence: EvidenceReferences {
                strategy_ids: pattern.strategy_ids(),
                episode_ids: pattern.episode_ids(),
                analytics_reference: pattern.analytics_reference(),
            },
        })
    }

    pub fn is_material(&self, original: f64, recommended: f64) -> bool {
        let change = (recommended - original).abs();
        if change <= self.min_absolute_change {
            return false;
        }
        if original.abs() > f64::EPSILON && change / original.abs() < self.min_relative_change {
            return false;
        }
        true
    }
}

impl Default for DecisionModifier {
    fn default() -> Self {
        Self::new(&ModifierConfig::default())
    }
}

fn rationale(pattern: &FieldPattern, original: f64, recommended: f64) -> String {
    let direction = if recommended < original { "reduce" } else { "increase" };
    let head = format!(
        "{} {} from {} to {} (confidence {:.2}, evidence {})",
        direction, pattern.field, original, recommended, pattern.combined_confidence, pattern.evidence_volume
    );

    let sources: Vec<String> = pattern
        .contributions
        .iter()
        .map(|w| match &w.evidence {
            Evidence::Strategy { applicability_score, .. } if pattern.strategy_dominated => {
                format!("matched strategy dominates (applicability {:.2})", applicability_score)
            }
            Evidence::Strategy { applicability_score, .. } => {
                format!("strategy at applicability {:.2}, weight {:.2}", applicability_score, w.weight)
            }
            Evidence::Episode { episode_ids, average_quality, .. } => format!(
                "{} similar episode(s) at quality {:.2}, weight {:.2}",
                episode_ids.len(),
                average_quality,
                w.weight
            ),
            Evidence::Analytics { signal, .. } => format!(
                "analytics over {} sample(s), weight {:.2}",
                signal.evidence_size, w.weight
            ),
        })
        .collect();

    if sources.is_empty() {
        head
    } else {
        format!("{}: {}", head, sources.join("; "))
    }
}
