// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Strategy evolution: the batch loop that mines successful episodes into
//! strategies and retunes strategy confidence from observed outcomes.

pub mod learning_optimizer;
pub mod pattern_extractor;
pub mod pipeline;
pub mod scheduler;
pub mod strategy_generator;
pub mod strategy_writer;

pub use learning_optimizer::{LearningOptimizer, OptimizationSummary};
pub use pattern_extractor::{EpisodeGroup, ExtractionParams, PatternExtractor};
pub use pipeline::{EvolutionError, EvolutionParams, EvolutionSummary, StrategyEvolutionPipeline};
pub use scheduler::EvolutionScheduler;
pub use strategy_generator::StrategyGenerator;
pub use strategy_writer::{StrategyWriter, WriteOutcome};
