// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pattern Extractor
//!
//! Groups high-quality episodes by `(context signature, action signature)`.
//! A group survives when it has enough episodes and their outcome qualities
//! agree (population standard deviation within the configured bound).
//! Low-quality episodes with the same key are kept as contradicting
//! evidence.

use std::collections::BTreeMap;

use crate::domain::context::ApplicabilityPredicate;
use crate::domain::decision::RecommendedAction;
use crate::domain::episode::{Episode, EpisodeId};

#[derive(Debug, Clone)]
pub struct EpisodeGroup {
    pub predicate: ApplicabilityPredicate,
    pub action: RecommendedAction,
    pub episodes: Vec<Episode>,
    pub contradicting: Vec<EpisodeId>,
    pub mean_quality: f64,
    pub quality_stddev: f64,
}

impl EpisodeGroup {
    pub fn key(&self) -> String {
        group_key(&self.predicate, &self.action)
    }

    pub fn episode_ids(&self) -> Vec<EpisodeId> {
        self.episodes.iter().map(|e| e.id).collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractionParams {
    pub min_outcome_quality: f64,
    pub min_episodes: usize,
    pub max_quality_stddev: f64,
    pub contradiction_quality: f64,
}

#[derive(Debug, Default)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Consistent groups, ordered by key.
    pub fn extract(&self, episodes: &[Episode], params: &ExtractionParams) -> Vec<EpisodeGroup> {
        let mut supporting: BTreeMap<String, (ApplicabilityPredicate, RecommendedAction, Vec<Episode>)> =
            BTreeMap::new();
        let mut contradicting: BTreeMap<String, Vec<EpisodeId>> = BTreeMap::new();

        for episode in episodes {
            let Some(quality) = episode.outcome_quality else {
                continue;
            };
            let predicate = ApplicabilityPredicate::from_context(&episode.context);
            if predicate.constrained_features() == 0 {
                continue;
            }

            for action in &episode.actions {
                let key = group_key(&predicate, action);
                if quality >= params.min_outcome_quality {
                    supporting
                        .entry(key)
                        .or_insert_with(|| (predicate.clone(), *action, Vec::new()))
                        .2
                        .push(episode.clone());
                } else if quality < params.contradiction_quality {
                    contradicting.entry(key).or_default().push(episode.id);
                }
            }
        }

        supporting
            .into_iter()
            .filter(|(_, (_, _, members))| members.len() >= params.min_episodes.max(1))
            .filter_map(|(key, (predicate, action, members))| {
                let qualities: Vec<f64> = members.iter().filter_map(|e| e.outcome_quality).collect();
                let (mean_quality, quality_stddev) = mean_and_stddev(&qualities);
                if quality_stddev > params.max_quality_stddev {
                    return None;
                }
                Some(EpisodeGroup {
                    predicate,
                    action,
                    episodes: members,
                    contradicting: contradicting.remove(&key).unwrap_or_default(),
                    mean_quality,
                    quality_stddev,
                })
            })
            .collect()
    }
}

fn group_key(predicate: &ApplicabilityPredicate, action: &RecommendedAction) -> String {
    format!("{}|{}", predicate.signature(), action.signature())
}

/// Mean and population standard deviation.
pub(crate) fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::{ApplicabilityContext, VelocityTrend};
    use crate::domain::decision::{BaselineDecision, DecisionField, DecisionSource, ProjectId};
    use crate::domain::episode::{EpisodeDecision, EpisodeType};

    fn params() -> ExtractionParams {
        ExtractionParams {
            min_outcome_quality: 0.85,
            min_episodes: 3,
            max_quality_stddev: 0.1,
            contradiction_quality: 0.5,
        }
    }

    fn episode(trend: VelocityTrend, tasks: f64, quality: f64) -> Episode {
        let baseline = BaselineDecision { task_count: 8, duration_days: 10 };
        let mut e = Episode::new(
            ProjectId::new(),
            EpisodeType::SprintPlanning,
            ApplicabilityContext {
                velocity_trend: Some(trend),
                team_size: Some(5),
                ..Default::default()
            },
            EpisodeDecision {
                rule_based: baseline,
                final_decision: baseline.with(DecisionField::TaskCount, tasks),
                decision_source: DecisionSource::IntelligenceEnhanced,
            },
            vec![RecommendedAction::absolute(DecisionField::TaskCount, tasks)],
        );
        e.record_outcome(serde_json::json!({}), quality);
        e
    }

    #[test]
    fn test_consistent_group_is_kept() {
        let episodes = vec![
            episode(VelocityTrend::Decreasing, 6.0, 0.9),
            episode(VelocityTrend::Decreasing, 6.0, 0.92),
            episode(VelocityTrend::Decreasing, 6.0, 0.88),
            episode(VelocityTrend::Decreasing, 6.0, 0.3),
            episode(VelocityTrend::Stable, 6.0, 0.95),
        ];
        let groups = PatternExtractor::new().extract(&episodes, &params());

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.episodes.len(), 3);
        assert_eq!(group.contradicting.len(), 1);
        assert!((group.mean_quality - 0.9).abs() < 1e-9);
        assert_eq!(group.predicate.velocity_trend, Some(VelocityTrend::Decreasing));
    }

    #[test]
    fn test_small_groups_are_dropped() {
        let episodes = vec![
            episode(VelocityTrend::Decreasing, 6.0, 0.9),
            episode(VelocityTrend::Decreasing, 6.0, 0.9),
            episode(VelocityTrend::Decreasing, 7.0, 0.9),
        ];
        assert!(PatternExtractor::new().extract(&episodes, &params()).is_empty());
    }

    #[test]
    fn test_inconsistent_outcomes_are_dropped() {
        let episodes = vec![
            episode(VelocityTrend::Decreasing, 6.0, 0.85),
            episode(VelocityTrend::Decreasing, 6.0, 1.0),
            episode(VelocityTrend::Decreasing, 6.0, 0.85),
            episode(VelocityTrend::Decreasing, 6.0, 1.0),
        ];
        let strict = ExtractionParams {
            max_quality_stddev: 0.05,
            ..params()
        };
        assert!(PatternExtractor::new().extract(&episodes, &strict).is_empty());
        assert_eq!(PatternExtractor::new().extract(&episodes, &params()).len(), 1);
    }

    #[test]
    fn test_mean_and_stddev() {
        let (mean, sd) = mean_and_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(mean, 5.0);
        assert_eq!(sd, 2.0);
    }
}
