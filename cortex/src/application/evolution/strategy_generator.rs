// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Strategy Generator
//!
//! Converts an [`EpisodeGroup`] into a candidate [`Strategy`]. The initial
//! confidence grows with outcome quality, outcome consistency and group
//! size:
//!
//! ```text
//! consistency = clamp(1 - stddev / 0.5)
//! size_factor = 1 - exp(-n / 5)
//! confidence  = clamp(mean_quality * consistency * (0.6 + 0.4 * size_factor))
//! ```

use std::collections::BTreeSet;

use super::pattern_extractor::EpisodeGroup;
use crate::domain::strategy::{Strategy, StrategyContent};

const STDDEV_SCALE: f64 = 0.5;
const SIZE_SCALE: f64 = 5.0;

#[derive(Debug, Default)]
pub struct StrategyGenerator;

impl StrategyGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, group: &EpisodeGroup) -> Strategy {
        let content = StrategyContent {
            applicability: group.predicate.clone(),
            action: group.action,
            context_centroid: centroid(group),
        };
        let description = format!(
            "{} when {} ({} episodes, mean quality {:.2})",
            group.action.describe(),
            group.predicate.signature(),
            group.episodes.len(),
            group.mean_quality
        );

        let mut strategy = Strategy::new(
            content,
            description,
            initial_confidence(group.mean_quality, group.quality_stddev, group.episodes.len()),
            group.episode_ids().into_iter().collect(),
        );
        strategy.contradicting_episodes = group.contradicting.iter().copied().collect::<BTreeSet<_>>();
        strategy
    }
}

pub fn initial_confidence(mean_quality: f64, quality_stddev: f64, size: usize) -> f64 {
    let consistency = (1.0 - quality_stddev / STDDEV_SCALE).clamp(0.0, 1.0);
    let size_factor = 1.0 - (-(size as f64) / SIZE_SCALE).exp();
    (mean_quality * consistency * (0.6 + 0.4 * size_factor)).clamp(0.0, 1.0)
}

/// Mean embedding of the group's embedded episodes, if their dimensions agree.
fn centroid(group: &EpisodeGroup) -> Option<Vec<f32>> {
    let embeddings: Vec<&Vec<f32>> = group.episodes.iter().filter_map(|e| e.embedding.as_ref()).collect();
    let dims = embeddings.first()?.len();
    if dims == 0 || embeddings.iter().any(|v| v.len() != dims) {
        return None;
    }

    let mut sum = vec![0.0f32; dims];
    for vector in &embeddings {
        for (acc, v) in sum.iter_mut().zip(vector.iter()) {
            *acc += v;
        }
    }
    let n = embeddings.len() as f32;
    Some(sum.into_iter().map(|v| v / n).collect())
}
