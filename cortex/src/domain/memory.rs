// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Decision context derived from retrieved episodes.
//!
//! Built fresh per request by the memory bridge and never persisted.

use serde::{Deserialize, Serialize};

use super::decision::{DecisionField, RecommendedAction};
use super::episode::EpisodeId;

/// Episodes that took the same action, with their outcome statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: RecommendedAction,
    pub occurrences: usize,
    /// Mean `outcome_quality`, used as the success-rate proxy.
    pub average_quality: f64,
    pub average_similarity: f64,
    /// `occurrences * average_quality`.
    pub rank_score: f64,
    pub episode_ids: Vec<EpisodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingEpisode {
    pub episode_id: EpisodeId,
    pub similarity: f64,
    pub outcome_quality: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    pub episode_count: usize,
    pub average_similarity: f64,
    /// Ranked by `rank_score`, best first.
    pub action_outcomes: Vec<ActionOutcome>,
    pub key_insights: Vec<String>,
    pub contributing_episodes: Vec<ContributingEpisode>,
    pub episode_influence_score: f64,
}

impl DecisionContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.episode_count == 0
    }

    /// Best-ranked action group for `field`.
    pub fn best_action_for(&self, field: DecisionField) -> Option<&ActionOutcome> {
        self.action_outcomes.iter().find(|o| o.action.field == field)
    }

    /// Number of episodes with a known outcome across all action groups.
    pub fn episodes_with_outcome_for(&self, field: DecisionField) -> usize {
        self.action_outcomes
            .iter()
            .filter(|o| o.action.field == field)
            .map(|o| o.occurrences)
            .sum()
    }
}
