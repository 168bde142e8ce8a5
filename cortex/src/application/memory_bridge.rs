// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Memory Bridge
//!
//! Turns retrieved episodes into a [`DecisionContext`]: episodes with a known
//! outcome are grouped by the action they took, each group carries its mean
//! outcome quality as a success proxy, and groups are ranked by
//! `occurrences * average_quality`.
//!
//! The influence score saturates with the episode count:
//! `average_similarity * (1 - exp(-n / saturation))`.

use std::collections::BTreeMap;

use crate::domain::config::RetrievalConfig;
use crate::domain::episode::ScoredEpisode;
use crate::domain::memory::{ActionOutcome, ContributingEpisode, DecisionContext};

pub struct MemoryBridge {
    max_insights: usize,
    influence_saturation: f64,
}

impl MemoryBridge {
    pub fn new(config: &RetrievalConfig) -> Self {
        Self {
            max_insights: config.max_insights,
            influence_saturation: config.influence_saturation.max(f64::EPSILON),
        }
    }

    pub fn build_context(&self, episodes: &[ScoredEpisode]) -> DecisionContext {
        if episodes.is_empty() {
            return DecisionContext::empty();
        }

        let n = episodes.len();
        let average_similarity =
            episodes.iter().map(|e| e.similarity.clamp(0.0, 1.0)).sum::<f64>() / n as f64;

        let mut groups: BTreeMap<String, ActionOutcome> = BTreeMap::new();
        let mut quality_sums: BTreeMap<String, (f64, f64)> = BTreeMap::new();

        for scored in episodes {
            let Some(quality) = scored.episode.outcome_quality else {
                continue;
            };
            for action in &scored.episode.actions {
                let signature = action.signature();
                let group = groups.entry(signature.clone()).or_insert_with(|| ActionOutcome {
                    action: *action,
                    occurrences: 0,
                    average_quality: 0.0,
                    average_similarity: 0.0,
                    rank_score: 0.0,
                    episode_ids: Vec::new(),
                });
                group.occurrences += 1;
                group.episode_ids.push(scored.episode.id);

                let sums = quality_sums.entry(signature).or_insert((0.0, 0.0));
                sums.0 += quality;
                sums.1 += scored.similarity.clamp(0.0, 1.0);
            }
        }

        let mut action_outcomes: Vec<ActionOutcome> = groups
            .into_iter()
            .map(|(signature, mut group)| {
                let (quality_sum, similarity_sum) = quality_sums.get(&signature).copied().unwrap_or((0.0, 0.0));
                let count = group.occurrences as f64;
                group.average_quality = quality_sum / count;
                group.average_similarity = similarity_sum / count;
                group.rank_score = count * group.average_quality;
                group
            })
            .collect();

        // BTreeMap order breaks ties deterministically
        action_outcomes.sort_by(|a, b| b.rank_score.total_cmp(&a.rank_score));

        let key_insights = action_outcomes
            .iter()
            .take(self.max_insights)
            .map(|group| {
                format!(
                    "{} in {} similar episode(s), average outcome quality {:.2}",
                    group.action.describe(),
                    group.occurrences,
                    group.average_quality
                )
            })
            .collect();

        let contributing_episodes = episodes
            .iter()
            .map(|e| ContributingEpisode {
                episode_id: e.episode.id,
                similarity: e.similarity,
                outcome_quality: e.episode.outcome_quality,
            })
            .collect();

        let saturation = 1.0 - (-(n as f64) / self.influence_saturation).exp();

        DecisionContext {
            episode_count: n,
            average_similarity,
            action_outcomes,
            key_insights,
            contributing_episodes,
            episode_influence_score: (average_similarity * saturation).clamp(0.0, 1.0),
        }
    }
}

impl Default for MemoryBridge {
    fn default() -> Self {
        Self::new(&RetrievalConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::ApplicabilityContext;
    use crate::domain::decision::{BaselineDecision, DecisionField, DecisionSource, ProjectId, RecommendedAction};
    use crate::domain::episode::{Episode, EpisodeDecision, EpisodeType};

    fn scored(tasks: f64, quality: Option<f64>, similarity: f64) -> ScoredEpisode {
        let baseline = BaselineDecision { task_count: 8, duration_days: 10 };
        let mut episode = Episode::new(
            ProjectId::new(),
            EpisodeType::SprintPlanning,
            ApplicabilityContext::default(),
            EpisodeDecision {
                rule_based: baseline,
                final_decision: baseline.with(DecisionField::TaskCount, tasks),
                decision_source: DecisionSource::IntelligenceEnhanced,
            },
            vec![RecommendedAction::absolute(DecisionField::TaskCount, tasks)],
        );
        if let Some(q) = quality {
            episode.record_outcome(serde_json::json!({}), q);
        }
        ScoredEpisode { episode, similarity }
    }

    #[test]
    fn test_empty_input_gives_empty_context() {
        let context = MemoryBridge::default().build_context(&[]);
        assert!(context.is_empty());
        assert_eq!(context.episode_influence_score, 0.0);
        assert!(context.key_insights.is_empty());
    }

    #[test]
    fn test_groups_are_ranked_by_count_times_quality() {
        let episodes = vec![
            scored(6.0, Some(0.9), 0.9),
            scored(6.0, Some(0.8), 0.9),
            scored(8.0, Some(1.0), 0.9),
            scored(10.0, None, 0.9),
        ];
        let context = MemoryBridge::default().build_context(&episodes);

        assert_eq!(context.episode_count, 4);
        assert_eq!(context.action_outcomes.len(), 2);
        let best = &context.action_outcomes[0];
        assert_eq!(best.action, RecommendedAction::absolute(DecisionField::TaskCount, 6.0));
        assert_eq!(best.occurrences, 2);
        assert!((best.average_quality - 0.85).abs() < 1e-9);
        assert!((best.rank_score - 1.7).abs() < 1e-9);
        assert_eq!(context.episodes_with_outcome_for(DecisionField::TaskCount), 3);
        assert_eq!(context.contributing_episodes.len(), 4);
    }

    #[test]
    fn test_insights_are_capped() {
        let episodes: Vec<_> = (0..6).map(|i| scored(3.0 + i as f64, Some(0.9), 0.8)).collect();
        let context = MemoryBridge::default().build_context(&episodes);
        assert_eq!(context.key_insights.len(), 3);
        assert!(context.key_insights[0].contains("similar episode"));
    }

    #[test]
    fn test_influence_saturates() {
        let bridge = MemoryBridge::default();
        let influence = |n: usize| {
            let episodes: Vec<_> = (0..n).map(|_| scored(6.0, Some(0.9), 1.0)).collect();
            bridge.build_context(&episodes).episode_influence_score
        };

        assert!(influence(1) < influence(3));
        assert!(influence(5) - influence(3) > influence(10) - influence(5));
        assert!(influence(10) <= 1.0);
        assert!(influence(10) - influence(5) < 0.1);
    }
}
