// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cortex Runtime - wires the decision core together from a `CortexConfig`

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::application::decision_service::DecisionService;
use crate::application::embedding_backfill::EmbeddingBackfill;
use crate::application::episode_logger::EpisodeLogger;
use crate::application::evolution::{EvolutionParams, EvolutionScheduler, StrategyEvolutionPipeline};
use crate::application::outcome_reconciler::OutcomeReconciler;
use crate::application::repository_factory::{
    create_analytics_provider, create_embedding_provider, create_repositories, CortexRepositories,
};
use crate::domain::collaborators::{AnalyticsProvider, EmbeddingProvider};
use crate::domain::config::CortexConfig;
use crate::infrastructure::event_bus::EventBus;

pub struct CortexRuntime {
    pub config: CortexConfig,
    pub repositories: CortexRepositories,
    pub event_bus: Arc<EventBus>,
    pub decisions: Arc<DecisionService>,
    pub logger: Arc<EpisodeLogger>,
    pub reconciler: Arc<OutcomeReconciler>,
    pub pipeline: Arc<StrategyEvolutionPipeline>,
    pub backfill: Arc<EmbeddingBackfill>,
}

impl CortexRuntime {
    /// Validate `config`, connect the configured backends and build every
    /// service.
    pub async fn build(config: CortexConfig) -> Result<Self> {
        config.validate().context("Invalid cortex configuration")?;

        let repositories = create_repositories(&config.storage).await?;
        let embedder = create_embedding_provider(&config.embedding)?;
        let analytics = create_analytics_provider(&config.analytics)?;

        info!(
            embedding_provider = ?config.embedding.provider,
            analytics = analytics.is_some(),
            "Cortex runtime initialized"
        );
        Ok(Self::from_parts(config, repositories, embedder, analytics))
    }

    /// Assemble from already constructed stores and collaborators.
    pub fn from_parts(
        config: CortexConfig,
        repositories: CortexRepositories,
        embedder: Arc<dyn EmbeddingProvider>,
        analytics: Option<Arc<dyn AnalyticsProvider>>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::with_default_capacity());

        let logger = Arc::new(EpisodeLogger::new(
            Arc::clone(&repositories.episodes),
            Arc::clone(&repositories.strategies),
            Arc::clone(&repositories.performance),
            Arc::clone(&embedder),
            Arc::clone(&event_bus),
            &config.logger,
        ));

        let decisions = Arc::new(
            DecisionService::new(
                &config,
                Arc::clone(&repositories.episodes),
                Arc::clone(&repositories.strategies),
                Arc::clone(&embedder),
                analytics,
                Arc::clone(&event_bus),
            )
            .with_logger(Arc::clone(&logger)),
        );

        let reconciler = Arc::new(OutcomeReconciler::new(
            Arc::clone(&repositories.episodes),
            Arc::clone(&repositories.performance),
            Arc::clone(&event_bus),
        ));

        let pipeline = Arc::new(StrategyEvolutionPipeline::new(
            Arc::clone(&repositories.episodes),
            Arc::clone(&repositories.strategies),
            Arc::clone(&repositories.performance),
            Arc::clone(&event_bus),
            &config.evolution,
        ));

        let backfill = Arc::new(EmbeddingBackfill::new(
            Arc::clone(&repositories.episodes),
            embedder,
            Arc::clone(&event_bus),
            config.backfill.clone(),
        ));

        Self {
            config,
            repositories,
            event_bus,
            decisions,
            logger,
            reconciler,
            pipeline,
            backfill,
        }
    }

    /// Scheduler running the pipeline with the configured parameters.
    pub fn evolution_scheduler(&self) -> Arc<EvolutionScheduler> {
        Arc::new(EvolutionScheduler::new(
            Arc::clone(&self.pipeline),
            EvolutionParams::from_config(&self.config.evolution),
            self.config.evolution.interval,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::ApplicabilityContext;
    use crate::domain::decision::{BaselineDecision, DecisionRequest, DecisionSource, ProjectId};

    #[tokio::test]
    async fn test_default_config_builds_in_memory_runtime() {
        let runtime = CortexRuntime::build(CortexConfig::default()).await.unwrap();
        let request = DecisionRequest::new(
            ProjectId::new(),
            BaselineDecision { task_count: 8, duration_days: 10 },
            ApplicabilityContext::default(),
        );

        let response = runtime.decisions.decide(request).await;
        assert_eq!(response.decisions.decision_source, DecisionSource::RuleBasedOnly);
        assert!(!runtime.pipeline.is_running());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = CortexConfig::default();
        config.gate.min_evidence = 0;
        assert!(CortexRuntime::build(config).await.is_err());
    }
}
