// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedding Backfill - background task that embeds episodes stored without a
//! vector
//!
//! Episodes whose embedding failed at decision time carry
//! `requires_embedding = true` and are invisible to similarity search. Each
//! pass re-requests embeddings for the pending episodes of a trailing window;
//! a failure leaves the flag set for the next pass.

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::collaborators::EmbeddingProvider;
use crate::domain::config::BackfillConfig;
use crate::domain::episode::Episode;
use crate::domain::events::CortexEvent;
use crate::domain::repository::EpisodeRepository;
use crate::infrastructure::event_bus::EventBus;

/// Embedding requests in flight during one pass.
const EMBED_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub pending: usize,
    pub embedded: usize,
    pub failed: usize,
}

pub struct EmbeddingBackfill {
    episodes: Arc<dyn EpisodeRepository>,
    embedder: Arc<dyn EmbeddingProvider>,
    event_bus: Arc<EventBus>,
    config: BackfillConfig,
    shutdown_token: CancellationToken,
}

impl EmbeddingBackfill {
    pub fn new(
        episodes: Arc<dyn EpisodeRepository>,
        embedder: Arc<dyn EmbeddingProvider>,
        event_bus: Arc<EventBus>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            episodes,
            embedder,
            event_bus,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Embed pending episodes created inside `window`, at most one batch.
    pub async fn run_once(&self, window: Duration) -> Result<BackfillSummary> {
        let window = chrono::Duration::from_std(window).context("Backfill window out of range")?;
        let since = Utc::now() - window;

        let mut pending = self
            .episodes
            .list_pending_embedding(since)
            .await
            .context("Failed to list episodes pending embedding")?;
        pending.truncate(self.config.batch_size);

        let attempted = pending.len();
        let embedded = stream::iter(pending)
            .map(|episode| self.backfill_one(episode))
            .buffer_unordered(EMBED_CONCURRENCY)
            .filter(|ok| futures::future::ready(*ok))
            .count()
            .await;

        Ok(BackfillSummary {
            pending: attempted,
            embedded,
            failed: attempted - embedded,
        })
    }

    async fn backfill_one(&self, episode: Episode) -> bool {
        let text = episode.embedding_text();
        let vector = match tokio::time::timeout(self.config.embedding_timeout, self.embedder.embed(&text)).await {
            Ok(Ok(vector)) if !vector.is_empty() => vector,
            Ok(Ok(_)) => {
                warn!(episode_id = %episode.id, "Empty embedding, leaving episode pending");
                return false;
            }
            Ok(Err(e)) => {
                warn!(episode_id = %episode.id, error = %e, "Embedding failed, leaving episode pending");
                return false;
            }
            Err(_) => {
                warn!(episode_id = %episode.id, "Embedding timed out, leaving episode pending");
                return false;
            }
        };

        match self.episodes.attach_embedding(episode.id, vector).await {
            Ok(()) => {
                debug!(episode_id = %episode.id, "Episode embedding backfilled");
                self.event_bus.publish(CortexEvent::EpisodeEmbeddingBackfilled {
                    episode_id: episode.id,
                    timestamp: Utc::now(),
                });
                true
            }
            Err(e) => {
                warn!(episode_id = %episode.id, error = %e, "Failed to attach embedding");
                false
            }
        }
    }

    /// Start the backfill background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            window_secs = self.config.window.as_secs(),
            "Starting embedding backfill background task"
        );

        let mut tick = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.run_once(self.config.window).await {
                        Ok(summary) if summary.pending > 0 => {
                            info!(
                                pending = summary.pending,
                                embedded = summary.embedded,
                                failed = summary.failed,
                                "Embedding backfill cycle completed"
                            );
                        }
                        Ok(_) => debug!("No episodes pending embedding"),
                        Err(e) => warn!("Embedding backfill cycle failed: {:#}", e),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping embedding backfill");
                    break;
                }
            }
        }

        info!("Embedding backfill background task stopped");
    }
}
