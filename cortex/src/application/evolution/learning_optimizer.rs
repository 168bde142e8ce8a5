// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Learning Optimizer
//!
//! Folds resolved application records into strategy counters and retunes
//! confidence with a damped step toward the observed success rate. A
//! strategy whose success rate falls to the deactivation threshold after
//! enough observed outcomes is deactivated.
//!
//! Records are claimed per record (`evaluated_at`), not by timestamp, so a
//! record resolved while a pass is running is picked up by the next pass.
//! A claim whose strategy write fails is released again. Each resolved
//! record is therefore folded into the counters at most once, and exactly
//! once unless releasing a failed claim also fails.
//!
//! Strategy writes go through `apply_learning`, which never touches the
//! application counters maintained by the live decision path.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::config::EvolutionConfig;
use crate::domain::events::CortexEvent;
use crate::domain::performance::StrategyApplicationRecord;
use crate::domain::repository::{PerformanceLog, RepositoryError, StrategyRepository};
use crate::domain::strategy::{LearningUpdate, Strategy, StrategyId};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizationSummary {
    pub evaluated: usize,
    pub tuned: Vec<StrategyId>,
    pub deactivated: Vec<StrategyId>,
}

pub struct LearningOptimizer {
    strategies: Arc<dyn StrategyRepository>,
    performance: Arc<dyn PerformanceLog>,
    event_bus: Arc<EventBus>,
    learning_rate: f64,
    max_confidence_step: f64,
    deactivation_threshold: f64,
    min_applications: u64,
    success_threshold: f64,
}

impl LearningOptimizer {
    pub fn new(
        strategies: Arc<dyn StrategyRepository>,
        performance: Arc<dyn PerformanceLog>,
        event_bus: Arc<EventBus>,
        config: &EvolutionConfig,
    ) -> Self {
        Self {
            strategies,
            performance,
            event_bus,
            learning_rate: config.learning_rate,
            max_confidence_step: config.max_confidence_step,
            deactivation_threshold: config.deactivation_threshold,
            min_applications: config.min_applications,
            success_threshold: config.success_threshold,
        }
    }

    pub async fn optimize(&self) -> Result<OptimizationSummary, RepositoryError> {
        let mut summary = OptimizationSummary::default();

        for strategy in self.strategies.list_active().await? {
            let now = Utc::now();
            let records = self.performance.claim_unevaluated(strategy.id, now).await?;
            if records.is_empty() {
                continue;
            }
            summary.evaluated += 1;

            let (update, success_rate) = self.learning_update(&strategy, &records, now);
            if let Err(e) = self.strategies.apply_learning(strategy.id, &update).await {
                self.release(&strategy, &records).await;
                return Err(e);
            }

            let Some(success_rate) = success_rate else {
                continue;
            };
            let observed = strategy.observed_outcomes() + update.successes + update.failures;

            if !update.is_active {
                metrics::counter!("helm_strategies_deactivated_total").increment(1);
                warn!(strategy_id = %strategy.id, success_rate, observed, "Strategy deactivated");
                self.event_bus.publish(CortexEvent::StrategyDeactivated {
                    strategy_id: strategy.id,
                    success_rate,
                    observed_outcomes: observed,
                    timestamp: now,
                });
                summary.deactivated.push(strategy.id);
                continue;
            }

            debug!(
                strategy_id = %strategy.id,
                successes = update.successes,
                failures = update.failures,
                success_rate,
                old_confidence = strategy.confidence,
                new_confidence = update.confidence,
                "Strategy confidence tuned"
            );
            self.event_bus.publish(CortexEvent::StrategyConfidenceTuned {
                strategy_id: strategy.id,
                old_confidence: strategy.confidence,
                new_confidence: update.confidence,
                success_rate,
                timestamp: now,
            });
            summary.tuned.push(strategy.id);
        }

        if summary.evaluated > 0 {
            info!(
                evaluated = summary.evaluated,
                tuned = summary.tuned.len(),
                deactivated = summary.deactivated.len(),
                "Learning optimizer pass completed"
            );
        }
        Ok(summary)
    }

    /// Learning update for `strategy` given newly claimed records, with the
    /// resulting success rate.
    fn learning_update(
        &self,
        strategy: &Strategy,
        records: &[StrategyApplicationRecord],
        now: DateTime<Utc>,
    ) -> (LearningUpdate, Option<f64>) {
        let successes = records
            .iter()
            .filter(|r| r.is_success(self.success_threshold) == Some(true))
            .count() as u64;
        let failures = records
            .iter()
            .filter(|r| r.is_success(self.success_threshold) == Some(false))
            .count() as u64;

        let mut projected = strategy.clone();
        projected.record_outcomes(successes, failures, now);
        let success_rate = projected.success_rate();

        let confidence = match success_rate {
            Some(rate) => projected.step_confidence_toward(rate, self.learning_rate, self.max_confidence_step),
            None => strategy.confidence,
        };
        let failing = success_rate.is_some_and(|rate| rate <= self.deactivation_threshold)
            && projected.observed_outcomes() >= self.min_applications;

        let update = LearningUpdate {
            successes,
            failures,
            confidence,
            evaluated_at: now,
            is_active: !failing,
        };
        (update, success_rate)
    }

    async fn release(&self, strategy: &Strategy, records: &[StrategyApplicationRecord]) {
        let ids: Vec<_> = records.iter().map(|r| r.id).collect();
        if let Err(e) = self.performance.release_claim(&ids).await {
            error!(
                strategy_id = %strategy.id,
                records = ids.len(),
                error = %e,
                "Failed to release claimed records, their outcomes will not be counted"
            );
        }
    }
}
