// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer: storage backends, external clients and the event bus.

pub mod analytics_client;
pub mod db;
pub mod embedding_client;
pub mod event_bus;
pub mod in_memory_store;
pub mod repositories;

pub use analytics_client::{HttpAnalyticsClient, StaticAnalyticsProvider};
pub use db::Database;
pub use embedding_client::{HashEmbeddingClient, OllamaEmbeddingClient};
pub use event_bus::{EventBus, EventBusError, EventReceiver};
pub use in_memory_store::{cosine_similarity, InMemoryCortexStore};
pub use repositories::{PostgresEpisodeRepository, PostgresPerformanceLog, PostgresStrategyRepository};
