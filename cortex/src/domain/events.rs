// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the decision core.
//! Published on the in-process `EventBus` for observability and integration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::{DecisionField, DecisionSource, ProjectId};
use super::episode::EpisodeId;
use super::pattern::EvidenceSource;
use super::strategy::StrategyId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CortexEvent {
    // Decision path

    /// The confidence gate ruled on a proposed adjustment
    AdjustmentGated {
        project_id: ProjectId,
        field: DecisionField,
        accepted: bool,
        confidence: f64,
        evidence_volume: usize,
        dominant_source: EvidenceSource,
        timestamp: DateTime<Utc>,
    },

    /// A finished decision was persisted as an episode
    EpisodeLogged {
        episode_id: EpisodeId,
        project_id: ProjectId,
        decision_source: DecisionSource,
        embedded: bool,
        application_records: usize,
        timestamp: DateTime<Utc>,
    },

    /// The backfill job attached an embedding to a pending episode
    EpisodeEmbeddingBackfilled {
        episode_id: EpisodeId,
        timestamp: DateTime<Utc>,
    },

    /// An outcome was attached to an episode and its open application records
    OutcomeRecorded {
        episode_id: EpisodeId,
        outcome_quality: f64,
        records_resolved: usize,
        timestamp: DateTime<Utc>,
    },

    // Strategy evolution

    StrategyCreated {
        strategy_id: StrategyId,
        signature: String,
        confidence: f64,
        supporting_episodes: usize,
        timestamp: DateTime<Utc>,
    },

    /// Fresh evidence was merged into an existing strategy
    StrategyEvidenceMerged {
        strategy_id: StrategyId,
        old_confidence: f64,
        new_confidence: f64,
        version: u32,
        timestamp: DateTime<Utc>,
    },

    /// The learning optimizer stepped a strategy's confidence
    StrategyConfidenceTuned {
        strategy_id: StrategyId,
        old_confidence: f64,
        new_confidence: f64,
        success_rate: f64,
        timestamp: DateTime<Utc>,
    },

    StrategyDeactivated {
        strategy_id: StrategyId,
        success_rate: f64,
        observed_outcomes: u64,
        timestamp: DateTime<Utc>,
    },

    EvolutionCompleted {
        strategies_created: usize,
        strategies_updated: usize,
        strategies_deactivated: usize,
        episodes_analyzed: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl CortexEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CortexEvent::AdjustmentGated { timestamp, .. } => *timestamp,
            CortexEvent::EpisodeLogged { timestamp, .. } => *timestamp,
            CortexEvent::EpisodeEmbeddingBackfilled { timestamp, .. } => *timestamp,
            CortexEvent::OutcomeRecorded { timestamp, .. } => *timestamp,
            CortexEvent::StrategyCreated { timestamp, .. } => *timestamp,
            CortexEvent::StrategyEvidenceMerged { timestamp, .. } => *timestamp,
            CortexEvent::StrategyConfidenceTuned { timestamp, .. } => *timestamp,
            CortexEvent::StrategyDeactivated { timestamp, .. } => *timestamp,
            CortexEvent::EvolutionCompleted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            CortexEvent::AdjustmentGated { .. } => "adjustment_gated",
            CortexEvent::EpisodeLogged { .. } => "episode_logged",
            CortexEvent::EpisodeEmbeddingBackfilled { .. } => "episode_embedding_backfilled",
            CortexEvent::OutcomeRecorded { .. } => "outcome_recorded",
            CortexEvent::StrategyCreated { .. } => "strategy_created",
            CortexEvent::StrategyEvidenceMerged { .. } => "strategy_evidence_merged",
            CortexEvent::StrategyConfidenceTuned { .. } => "strategy_confidence_tuned",
            CortexEvent::StrategyDeactivated { .. } => "strategy_deactivated",
            CortexEvent::EvolutionCompleted { .. } => "evolution_completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = CortexEvent::StrategyCreated {
            strategy_id: StrategyId::new(),
            signature: "team=medium;velocity=*;phase=*|task_count=abs:6.00".to_string(),
            confidence: 0.81,
            supporting_episodes: 4,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"strategy_created\""));
        let deserialized: CortexEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.event_type(), deserialized.event_type());
        assert_eq!(event.timestamp(), deserialized.timestamp());
    }

    #[test]
    fn test_gate_event_type() {
        let event = CortexEvent::AdjustmentGated {
            project_id: ProjectId::new(),
            field: DecisionField::TaskCount,
            accepted: false,
            confidence: 0.4,
            evidence_volume: 3,
            dominant_source: EvidenceSource::Episode,
            timestamp: Utc::now(),
        };

        assert_eq!(event.event_type(), "adjustment_gated");
    }
}
