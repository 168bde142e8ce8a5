// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application layer: the decision pipeline, the background writers and the
//! strategy evolution loop.

pub mod confidence_gate;
pub mod decision_modifier;
pub mod decision_service;
pub mod embedding_backfill;
pub mod episode_logger;
pub mod episode_retriever;
pub mod evolution;
pub mod memory_bridge;
pub mod outcome_reconciler;
pub mod pattern_combiner;
pub mod repository_factory;
pub mod retry;
pub mod runtime;
pub mod strategy_matcher;

pub use confidence_gate::ConfidenceGate;
pub use decision_modifier::DecisionModifier;
pub use decision_service::DecisionService;
pub use embedding_backfill::{BackfillSummary, EmbeddingBackfill};
pub use episode_logger::{EpisodeLogEntry, EpisodeLogger, StrategyApplication};
pub use episode_retriever::{EpisodeRetriever, Retrieval, RetrievalSource};
pub use evolution::{
    EvolutionError, EvolutionParams, EvolutionScheduler, EvolutionSummary, LearningOptimizer, StrategyEvolutionPipeline,
};
pub use memory_bridge::MemoryBridge;
pub use outcome_reconciler::{OutcomeReconciler, OutcomeSummary};
pub use pattern_combiner::PatternCombiner;
pub use repository_factory::{
    create_analytics_provider, create_embedding_provider, create_repositories, CortexRepositories,
};
pub use retry::RetryPolicy;
pub use runtime::CortexRuntime;
pub use strategy_matcher::StrategyMatcher;
