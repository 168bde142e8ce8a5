// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL repository implementations of the cortex persistence traits.
//!
//! - **PostgresEpisodeRepository** - episodes, pgvector similarity search
//! - **PostgresStrategyRepository** - versioned strategies
//! - **PostgresPerformanceLog** - strategy application records
//!
//! The in-memory counterpart for development and tests is
//! `InMemoryCortexStore`.

pub mod postgres_episode;
pub mod postgres_performance;
pub mod postgres_strategy;

pub use postgres_episode::PostgresEpisodeRepository;
pub use postgres_performance::PostgresPerformanceLog;
pub use postgres_strategy::PostgresStrategyRepository;
