// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Strategy Aggregate
//!
//! A strategy is a reusable decision rule mined from successful episodes:
//! "when the context looks like *this*, do *that*". Strategies are versioned,
//! carry a confidence in [0,1] and their own application statistics.
//!
//! ## Lifecycle
//!
//! 1. Created by the strategy generator from a group of consistent episodes.
//! 2. Merged (evidence union, confidence reconciled) when the same
//!    applicability + action signature is mined again.
//! 3. Retuned by the learning optimizer from application outcomes.
//! 4. Deactivated when its success rate collapses. Never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use super::context::{ApplicabilityContext, ApplicabilityPredicate};
use super::decision::RecommendedAction;
use super::episode::EpisodeId;

pub const STRATEGY_TYPE: &str = "strategy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrategyId(pub Uuid);

impl StrategyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StrategyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Applicability plus recommended action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyContent {
    pub applicability: ApplicabilityPredicate,
    pub action: RecommendedAction,
    /// Mean embedding of the episodes the strategy was mined from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_centroid: Option<Vec<f32>>,
}

impl StrategyContent {
    pub fn signature(&self) -> String {
        format!("{}|{}", self.applicability.signature(), self.action.signature())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: StrategyId,
    pub strategy_type: String,
    pub content: StrategyContent,
    pub description: String,
    pub confidence: f64,
    pub supporting_episodes: BTreeSet<EpisodeId>,
    pub contradicting_episodes: BTreeSet<EpisodeId>,
    pub times_applied: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub last_applied_at: Option<DateTime<Utc>>,
    /// Watermark of the newest resolved application record already folded
    /// into the counters.
    pub last_evaluated_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Strategy {
    pub fn new(
        content: StrategyContent,
        description: String,
        confidence: f64,
        supporting_episodes: BTreeSet<EpisodeId>,
    ) -> Self {
        Self {
            id: StrategyId::new(),
            strategy_type: STRATEGY_TYPE.to_string(),
            content,
            description,
            confidence: clamp_unit(confidence),
            supporting_episodes,
            contradicting_episodes: BTreeSet::new(),
            times_applied: 0,
            success_count: 0,
            failure_count: 0,
            version: 1,
            created_at: Utc::now(),
            last_validated_at: None,
            last_applied_at: None,
            last_evaluated_at: None,
            is_active: true,
        }
    }

    pub fn signature(&self) -> String {
        self.content.signature()
    }

    /// `success / (success + failure)`, undefined when nothing was observed.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            return None;
        }
        Some(clamp_unit(self.success_count as f64 / total as f64))
    }

    pub fn observed_outcomes(&self) -> u64 {
        self.success_count + self.failure_count
    }

    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = clamp_unit(confidence);
    }

    /// Applicability of this strategy to `context`, if any.
    pub fn applicability(&self, context: &ApplicabilityContext) -> Option<f64> {
        self.content.applicability.evaluate(context)
    }

    /// Move confidence a fraction of the way toward `target`.
    ///
    /// The move is `learning_rate * (target - confidence)`, capped at
    /// `max_step` in either direction. Returns the new confidence.
    pub fn step_confidence_toward(&mut self, target: f64, learning_rate: f64, max_step: f64) -> f64 {
        let target = clamp_unit(target);
        let delta = (learning_rate * (target - self.confidence)).clamp(-max_step, max_step);
        self.set_confidence(self.confidence + delta);
        self.confidence
    }

    /// Fold a batch of observed outcomes into the counters.
    pub fn record_outcomes(&mut self, successes: u64, failures: u64, validated_at: DateTime<Utc>) {
        self.success_count += successes;
        self.failure_count += failures;
        self.last_validated_at = Some(validated_at);
    }

    /// Fold one optimizer pass into the learning state. Application
    /// counters are left alone.
    pub fn apply_learning(&mut self, update: &LearningUpdate) {
        self.record_outcomes(update.successes, update.failures, update.evaluated_at);
        self.set_confidence(update.confidence);
        self.last_evaluated_at = Some(update.evaluated_at);
        self.is_active = self.is_active && update.is_active;
    }

    pub fn record_application(&mut self, applied_at: DateTime<Utc>) {
        self.times_applied += 1;
        self.last_applied_at = Some(applied_at);
    }

    /// Merge evidence of a freshly generated equivalent strategy.
    ///
    /// Confidence is reconciled as an evidence-weighted mean over episodes
    /// that are new to this strategy. Returns `false` when nothing changed,
    /// which keeps repeated pipeline runs idempotent.
    pub fn merge_evidence(&mut self, candidate: &Strategy) -> bool {
        let new_support: BTreeSet<EpisodeId> = candidate
            .supporting_episodes
            .difference(&self.supporting_episodes)
            .copied()
            .collect();
        let new_contradictions: BTreeSet<EpisodeId> = candidate
            .contradicting_episodes
            .difference(&self.contradicting_episodes)
            .copied()
            .collect();

        if new_support.is_empty() && new_contradictions.is_empty() {
            return false;
        }

        if !new_support.is_empty() {
            let existing = self.supporting_episodes.len().max(1) as f64;
            let added = new_support.len() as f64;
            let reconciled = (self.confidence * existing + candidate.confidence * added) / (existing + added);
            self.set_confidence(reconciled);
        }

        self.supporting_episodes.extend(new_support);
        self.contradicting_episodes.extend(new_contradictions);
        if candidate.content.context_centroid.is_some() {
            self.content.context_centroid = candidate.content.context_centroid.clone();
        }
        self.version += 1;
        true
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

/// Result of one learning-optimizer pass over a strategy.
///
/// Outcome counts are increments; confidence is the new absolute value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningUpdate {
    pub successes: u64,
    pub failures: u64,
    pub confidence: f64,
    pub evaluated_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Strategy returned by the matcher.
#[derive(Debug, Clone)]
pub struct StrategyMatch {
    pub strategy: Strategy,
    /// How well the current context satisfies the applicability predicate.
    /// Independent of the strategy's own historical confidence.
    pub applicability_score: f64,
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
