// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Strategy Evolution Pipeline
//!
//! Extractor → Generator → Writer → Learning Optimizer, run as one batch.
//! Runs are single-flight: a second run while one is in progress is refused
//! with [`EvolutionError::AlreadyRunning`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use super::learning_optimizer::LearningOptimizer;
use super::pattern_extractor::{ExtractionParams, PatternExtractor};
use super::strategy_generator::StrategyGenerator;
use super::strategy_writer::{StrategyWriter, WriteOutcome};
use crate::domain::config::EvolutionConfig;
use crate::domain::events::CortexEvent;
use crate::domain::repository::{EpisodeRepository, PerformanceLog, RepositoryError, StrategyRepository};
use crate::infrastructure::event_bus::EventBus;

/// Background job trigger parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvolutionParams {
    pub min_outcome_quality: f64,
    #[serde(with = "humantime_serde")]
    pub lookback_window: Duration,
    pub min_episodes_per_pattern: usize,
}

impl EvolutionParams {
    pub fn from_config(config: &EvolutionConfig) -> Self {
        Self {
            min_outcome_quality: config.min_outcome_quality,
            lookback_window: config.lookback_window,
            min_episodes_per_pattern: config.min_episodes_per_pattern,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionSummary {
    pub strategies_created: usize,
    pub strategies_updated: usize,
    pub strategies_deactivated: usize,
    pub episodes_analyzed: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Error)]
pub enum EvolutionError {
    #[error("An evolution run is already in progress")]
    AlreadyRunning,

    #[error("Invalid evolution parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct StrategyEvolutionPipeline {
    episodes: Arc<dyn EpisodeRepository>,
    event_bus: Arc<EventBus>,
    extractor: PatternExtractor,
    generator: StrategyGenerator,
    writer: StrategyWriter,
    optimizer: LearningOptimizer,
    max_quality_stddev: f64,
    contradiction_quality: f64,
    run_guard: Mutex<()>,
}

impl StrategyEvolutionPipeline {
    pub fn new(
        episodes: Arc<dyn EpisodeRepository>,
        strategies: Arc<dyn StrategyRepository>,
        performance: Arc<dyn PerformanceLog>,
        event_bus: Arc<EventBus>,
        config: &EvolutionConfig,
    ) -> Self {
        Self {
            episodes,
            extractor: PatternExtractor::new(),
            generator: StrategyGenerator::new(),
            writer: StrategyWriter::new(Arc::clone(&strategies), Arc::clone(&event_bus)),
            optimizer: LearningOptimizer::new(strategies, performance, Arc::clone(&event_bus), config),
            event_bus,
            max_quality_stddev: config.max_quality_stddev,
            contradiction_quality: config.contradiction_quality,
            run_guard: Mutex::new(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.run_guard.try_lock().is_err()
    }

    pub async fn run(&self, params: EvolutionParams) -> Result<EvolutionSummary, EvolutionError> {
        let _guard = self.run_guard.try_lock().map_err(|_| EvolutionError::AlreadyRunning)?;
        validate(&params)?;

        let started = Instant::now();
        let lookback = chrono::Duration::from_std(params.lookback_window)
            .map_err(|e| EvolutionError::InvalidParams(format!("lookback_window: {}", e)))?;
        let since = Utc::now() - lookback;

        let episodes = self.episodes.list_with_outcome_since(since).await?;
        let groups = self.extractor.extract(
            &episodes,
            &ExtractionParams {
                min_outcome_quality: params.min_outcome_quality,
                min_episodes: params.min_episodes_per_pattern,
                max_quality_stddev: self.max_quality_stddev,
                contradiction_quality: self.contradiction_quality,
            },
        );

        let mut created = 0;
        let mut updated = BTreeSet::new();
        for group in &groups {
            match self.writer.write(self.generator.generate(group)).await? {
                WriteOutcome::Created(_) => created += 1,
                WriteOutcome::Merged(id) => {
                    updated.insert(id);
                }
                WriteOutcome::Unchanged(_) => {}
            }
        }

        let optimization = self.optimizer.optimize().await?;
        updated.extend(optimization.tuned.iter().copied());

        let summary = EvolutionSummary {
            strategies_created: created,
            strategies_updated: updated.len(),
            strategies_deactivated: optimization.deactivated.len(),
            episodes_analyzed: episodes.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            episodes_analyzed = summary.episodes_analyzed,
            patterns = groups.len(),
            created = summary.strategies_created,
            updated = summary.strategies_updated,
            deactivated = summary.strategies_deactivated,
            duration_ms = summary.duration_ms,
            "Strategy evolution run completed"
        );
        self.event_bus.publish(CortexEvent::EvolutionCompleted {
            strategies_created: summary.strategies_created,
            strategies_updated: summary.strategies_updated,
            strategies_deactivated: summary.strategies_deactivated,
            episodes_analyzed: summary.episodes_analyzed,
            duration_ms: summary.duration_ms,
            timestamp: Utc::now(),
        });

        Ok(summary)
    }
}

fn validate(params: &EvolutionParams) -> Result<(), EvolutionError> {
    if !(0.0..=1.0).contains(&params.min_outcome_quality) {
        return Err(EvolutionError::InvalidParams(format!(
            "min_outcome_quality {} outside [0,1]",
            params.min_outcome_quality
        )));
    }
    if params.lookback_window.is_zero() {
        return Err(EvolutionError::InvalidParams("lookback_window must be positive".into()));
    }
    if params.min_episodes_per_pattern == 0 {
        return Err(EvolutionError::InvalidParams("min_episodes_per_pattern must be at least 1".into()));
    }
    Ok(())
}
