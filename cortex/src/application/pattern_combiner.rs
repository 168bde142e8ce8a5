// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pattern Combiner
//!
//! Reduces matched strategies, the episode decision context and analytics to
//! [`Evidence`], then folds the evidence of each decision field into a
//! [`FieldPattern`]:
//!
//! - weights are `confidence * evidence_size`, normalized per field;
//! - the recommended value is the weighted mean of each recommendation
//!   resolved against the baseline, and so is the confidence;
//! - when the best matched strategy's applicability exceeds the dominance
//!   threshold, it alone sets value and confidence and every other source is
//!   kept as corroboration.
//!
//! Evidence volume always counts every source that spoke about the field.

use std::collections::BTreeMap;

use crate::domain::collaborators::PatternSummary;
use crate::domain::config::CombinerConfig;
use crate::domain::decision::{BaselineDecision, DecisionField};
use crate::domain::memory::DecisionContext;
use crate::domain::pattern::{Evidence, EvidenceSignal, EvidenceSource, FieldPattern, PatternSet, WeightedEvidence};
use crate::domain::strategy::StrategyMatch;

pub struct PatternCombiner {
    dominance_threshold: f64,
}

impl PatternCombiner {
    pub fn new(config: &CombinerConfig) -> Self {
        Self {
            dominance_threshold: config.dominance_threshold,
        }
    }

    pub fn combine(
        &self,
        baseline: &BaselineDecision,
        strategies: &[StrategyMatch],
        memory: &DecisionContext,
        analytics: Option<&PatternSummary>,
    ) -> PatternSet {
        let evidence = collect_evidence(strategies, memory, analytics);
        self.combine_evidence(baseline, evidence)
    }

    pub fn combine_evidence(&self, baseline: &BaselineDecision, evidence: Vec<Evidence>) -> PatternSet {
        let mut by_field: BTreeMap<DecisionField, Vec<Evidence>> = BTreeMap::new();
        for item in evidence {
            by_field.entry(item.field()).or_default().push(item);
        }

        let fields = by_field
            .into_iter()
            .filter_map(|(field, items)| {
                self.combine_field(field, baseline.get(field), items)
                    .map(|pattern| (field, pattern))
            })
            .collect();

        PatternSet::from_fields(fields)
    }

    fn combine_field(&self, field: DecisionField, baseline: f64, items: Vec<Evidence>) -> Option<FieldPattern> {
        let evidence_volume: usize = items.iter().map(|e| e.signal().evidence_size).sum();

        if let Some(index) = self.dominant_strategy(&items) {
            let mut items = items;
            let dominant = items.remove(index);
            let signal = dominant.signal();
            let recommended_value = signal.recommendation.resolve(baseline);
            let combined_confidence = signal.confidence;
            return Some(FieldPattern {
                field,
                recommended_value,
                combined_confidence,
                evidence_volume,
                dominant_source: EvidenceSource::Strategy,
                strategy_dominated: true,
                contributions: vec![WeightedEvidence {
                    evidence: dominant,
                    weight: 1.0,
                    resolved_value: recommended_value,
                }],
                corroboration: items,
            });
        }

        let total_weight: f64 = items.iter().map(|e| e.signal().raw_weight()).sum();
        if total_weight <= 0.0 {
            return None;
        }

        let contributions: Vec<WeightedEvidence> = items
            .into_iter()
            .map(|evidence| {
                let weight = evidence.signal().raw_weight() / total_weight;
                let resolved_value = evidence.signal().recommendation.resolve(baseline);
                WeightedEvidence {
                    evidence,
                    weight,
                    resolved_value,
                }
            })
            .collect();

        let recommended_value = contributions.iter().map(|w| w.weight * w.resolved_value).sum();
        let combined_confidence = contributions
            .iter()
            .map(|w| w.weight * w.evidence.signal().confidence)
            .sum::<f64>()
            .clamp(0.0, 1.0);

        let mut source_weight: BTreeMap<&'static str, (EvidenceSource, f64)> = BTreeMap::new();
        for w in &contributions {
            let source = w.evidence.source();
            source_weight.entry(source.as_str()).or_insert((source, 0.0)).1 += w.weight;
        }
        let dominant_source = source_weight
            .values()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(source, _)| *source)
            .unwrap_or(EvidenceSource::Episode);

        Some(FieldPattern {
            field,
            recommended_value,
            combined_confidence,
            evidence_volume,
            dominant_source,
            strategy_dominated: false,
            contributions,
            corroboration: Vec::new(),
        })
    }

    /// Index of the most applicable strategy, if it clears the threshold.
    fn dominant_strategy(&self, items: &[Evidence]) -> Option<usize> {
        items
            .iter()
            .enumerate()
            .filter_map(|(i, e)| match e {
                Evidence::Strategy {
                    applicability_score,
                    signal,
                    ..
                } if *applicability_score > self.dominance_threshold => {
                    Some((i, *applicability_score, signal.confidence))
                }
                _ => None,
            })
            .max_by(|a, b| a.1.total_cmp(&b.1).then(a.2.total_cmp(&b.2)))
            .map(|(i, _, _)| i)
    }
}

impl Default for PatternCombiner {
    fn default() -> Self {
        Self::new(&CombinerConfig::default())
    }
}

/// Reduce every source to the uniform evidence shape.
pub fn collect_evidence(
    strategies: &[StrategyMatch],
    memory: &DecisionContext,
    analytics: Option<&PatternSummary>,
) -> Vec<Evidence> {
    let mut evidence = Vec::new();

    for m in strategies {
        let strategy = &m.strategy;
        evidence.push(Evidence::Strategy {
            strategy_id: strategy.id,
            applicability_score: m.applicability_score,
            strategy_confidence: strategy.confidence,
            signal: EvidenceSignal::new(
                strategy.content.action,
                strategy.confidence * m.applicability_score,
                strategy.supporting_episodes.len().max(1),
            ),
        });
    }

    for field in DecisionField::ALL {
        let Some(group) = memory.best_action_for(field) else {
            continue;
        };
        let with_outcome = memory.episodes_with_outcome_for(field).max(1);
        let share = group.occurrences as f64 / with_outcome as f64;
        evidence.push(Evidence::Episode {
            episode_ids: group.episode_ids.clone(),
            average_quality: group.average_quality,
            signal: EvidenceSignal::new(
                group.action,
                group.average_quality * memory.episode_influence_score * share,
                group.occurrences,
            ),
        });
    }

    if let Some(summary) = analytics {
        for recommendation in &summary.recommendations {
            evidence.push(Evidence::Analytics {
                reference: summary.reference.clone(),
                signal: EvidenceSignal::new(recommendation.action, recommendation.confidence, summary.sample_size),
            });
        }
    }

    evidence
}
