// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Evolution Scheduler - background task running the strategy evolution
//! pipeline on a fixed interval (daily by default)

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pipeline::{EvolutionError, EvolutionParams, StrategyEvolutionPipeline};

pub struct EvolutionScheduler {
    pipeline: Arc<StrategyEvolutionPipeline>,
    params: EvolutionParams,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl EvolutionScheduler {
    pub fn new(pipeline: Arc<StrategyEvolutionPipeline>, params: EvolutionParams, interval: Duration) -> Self {
        Self {
            pipeline,
            params,
            interval,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Start the scheduler background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs(),
            min_outcome_quality = self.params.min_outcome_quality,
            lookback_secs = self.params.lookback_window.as_secs(),
            "Starting strategy evolution scheduler"
        );

        let mut tick = interval(self.interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running scheduled strategy evolution");
                    match self.pipeline.run(self.params).await {
                        Ok(summary) => info!(
                            created = summary.strategies_created,
                            updated = summary.strategies_updated,
                            deactivated = summary.strategies_deactivated,
                            episodes_analyzed = summary.episodes_analyzed,
                            "Scheduled strategy evolution completed"
                        ),
                        Err(EvolutionError::AlreadyRunning) => {
                            warn!("Skipping scheduled evolution, a run is already in progress")
                        }
                        Err(e) => warn!("Scheduled strategy evolution failed: {}", e),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping evolution scheduler");
                    break;
                }
            }
        }

        info!("Evolution scheduler stopped");
    }
}
