// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Strategy Repository writer
//!
//! Idempotent upsert keyed by the applicability + action signature. A
//! candidate equivalent to a stored strategy merges its evidence into it
//! instead of creating a duplicate; a candidate that brings no new episodes
//! changes nothing. Merges write only the evidence columns, so applications
//! recorded by live decisions meanwhile are preserved.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::events::CortexEvent;
use crate::domain::repository::{RepositoryError, StrategyRepository};
use crate::domain::strategy::{Strategy, StrategyId};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created(StrategyId),
    Merged(StrategyId),
    Unchanged(StrategyId),
}

pub struct StrategyWriter {
    strategies: Arc<dyn StrategyRepository>,
    event_bus: Arc<EventBus>,
}

impl StrategyWriter {
    pub fn new(strategies: Arc<dyn StrategyRepository>, event_bus: Arc<EventBus>) -> Self {
        Self { strategies, event_bus }
    }

    pub async fn write(&self, candidate: Strategy) -> Result<WriteOutcome, RepositoryError> {
        let signature = candidate.signature();

        let Some(mut existing) = self.strategies.find_by_signature(&signature).await? else {
            self.strategies.upsert(&candidate).await?;
            info!(
                strategy_id = %candidate.id,
                signature = %signature,
                confidence = candidate.confidence,
                "Strategy created"
            );
            self.event_bus.publish(CortexEvent::StrategyCreated {
                strategy_id: candidate.id,
                signature,
                confidence: candidate.confidence,
                supporting_episodes: candidate.supporting_episodes.len(),
                timestamp: Utc::now(),
            });
            return Ok(WriteOutcome::Created(candidate.id));
        };

        let old_confidence = existing.confidence;
        if !existing.merge_evidence(&candidate) {
            debug!(strategy_id = %existing.id, "Candidate brings no new evidence");
            return Ok(WriteOutcome::Unchanged(existing.id));
        }

        self.strategies.update_evidence(&existing).await?;
        info!(
            strategy_id = %existing.id,
            version = existing.version,
            old_confidence,
            new_confidence = existing.confidence,
            "Strategy evidence merged"
        );
        self.event_bus.publish(CortexEvent::StrategyEvidenceMerged {
            strategy_id: existing.id,
            old_confidence,
            new_confidence: existing.confidence,
            version: existing.version,
            timestamp: Utc::now(),
        });
        Ok(WriteOutcome::Merged(existing.id))
    }
}
