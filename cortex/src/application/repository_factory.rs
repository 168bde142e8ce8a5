// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory
//!
//! Builds the repository and collaborator implementations selected by
//! configuration. The in-memory backend hands out one shared store behind
//! all three repository traits so that purge cascades work as they do in
//! PostgreSQL.

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::domain::collaborators::{AnalyticsProvider, EmbeddingProvider};
use crate::domain::config::{AnalyticsConfig, EmbeddingConfig, EmbeddingProviderKind};
use crate::domain::repository::{EpisodeRepository, PerformanceLog, StorageBackend, StrategyRepository};
use crate::infrastructure::analytics_client::HttpAnalyticsClient;
use crate::infrastructure::db::Database;
use crate::infrastructure::embedding_client::{HashEmbeddingClient, OllamaEmbeddingClient};
use crate::infrastructure::in_memory_store::InMemoryCortexStore;
use crate::infrastructure::repositories::{PostgresEpisodeRepository, PostgresPerformanceLog, PostgresStrategyRepository};

/// The three stores of the decision core.
#[derive(Clone)]
pub struct CortexRepositories {
    pub episodes: Arc<dyn EpisodeRepository>,
    pub strategies: Arc<dyn StrategyRepository>,
    pub performance: Arc<dyn PerformanceLog>,
}

impl CortexRepositories {
    pub fn in_memory(store: InMemoryCortexStore) -> Self {
        Self {
            episodes: Arc::new(store.clone()),
            strategies: Arc::new(store.clone()),
            performance: Arc::new(store),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            episodes: Arc::new(PostgresEpisodeRepository::new(pool.clone())),
            strategies: Arc::new(PostgresStrategyRepository::new(pool.clone())),
            performance: Arc::new(PostgresPerformanceLog::new(pool)),
        }
    }
}

/// Connect the configured backend. PostgreSQL schemas are migrated on
/// connect.
pub async fn create_repositories(backend: &StorageBackend) -> Result<CortexRepositories> {
    match backend {
        StorageBackend::InMemory => {
            info!("Using in-memory cortex store");
            Ok(CortexRepositories::in_memory(InMemoryCortexStore::new()))
        }
        StorageBackend::PostgreSQL(config) => {
            let db = Database::connect(config).await?;
            db.migrate().await?;
            info!(max_connections = config.max_connections, "Using PostgreSQL cortex store");
            Ok(CortexRepositories::postgres(db.get_pool().clone()))
        }
    }
}

pub fn create_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderKind::Hash => Ok(Arc::new(HashEmbeddingClient::new(config.dimensions))),
        EmbeddingProviderKind::Ollama => {
            let client = OllamaEmbeddingClient::new(
                config.url.clone(),
                config.model.clone(),
                config.dimensions,
                config.timeout,
            )
            .context("Failed to build Ollama embedding client")?;
            Ok(Arc::new(client))
        }
    }
}

/// `None` when no analytics endpoint is configured.
pub fn create_analytics_provider(config: &AnalyticsConfig) -> Result<Option<Arc<dyn AnalyticsProvider>>> {
    match &config.url {
        Some(url) => {
            let client = HttpAnalyticsClient::new(url.clone(), config.timeout)
                .context("Failed to build analytics client")?;
            Ok(Some(Arc::new(client)))
        }
        None => Ok(None),
    }
}
