// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Episode Retriever
//!
//! Vector-similarity lookup over the episode store behind a read-through TTL
//! cache. Keys are the SHA-256 of the query vector and limit; a hit never
//! touches the store. The store query is bounded by a timeout, and a timeout
//! or store error degrades to an empty result.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::domain::config::RetrievalConfig;
use crate::domain::episode::ScoredEpisode;
use crate::domain::pattern::{EvidenceError, EvidenceSource};
use crate::domain::repository::EpisodeRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalSource {
    Cache,
    Store,
}

#[derive(Debug, Clone)]
pub struct Retrieval {
    pub episodes: Vec<ScoredEpisode>,
    pub source: RetrievalSource,
}

struct CacheEntry {
    episodes: Vec<ScoredEpisode>,
    inserted_at: Instant,
}

pub struct EpisodeRetriever {
    repository: Arc<dyn EpisodeRepository>,
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
    capacity: usize,
    timeout: Duration,
    default_limit: usize,
}

impl EpisodeRetriever {
    pub fn new(repository: Arc<dyn EpisodeRepository>, config: &RetrievalConfig) -> Self {
        Self {
            repository,
            cache: DashMap::new(),
            ttl: config.cache_ttl,
            capacity: config.cache_capacity.max(1),
            timeout: config.timeout,
            default_limit: config.limit,
        }
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Episodes most similar to `vector`, best first. Never fails: an
    /// unavailable store yields an empty list.
    pub async fn retrieve(&self, vector: &[f32], limit: usize) -> Vec<ScoredEpisode> {
        match self.retrieve_detailed(vector, limit).await {
            Ok(retrieval) => retrieval.episodes,
            Err(e) => {
                warn!(error = %e, "Episode retrieval degraded to empty result");
                Vec::new()
            }
        }
    }

    /// Like [`retrieve`](Self::retrieve) but reports where the result came
    /// from and why it is missing.
    pub async fn retrieve_detailed(&self, vector: &[f32], limit: usize) -> Result<Retrieval, EvidenceError> {
        let key = cache_key(vector, limit);

        if let Some(episodes) = self.cached(&key) {
            metrics::counter!("helm_episode_cache_total", "result" => "hit").increment(1);
            debug!(count = episodes.len(), "Episode cache hit");
            return Ok(Retrieval {
                episodes,
                source: RetrievalSource::Cache,
            });
        }
        metrics::counter!("helm_episode_cache_total", "result" => "miss").increment(1);

        let started = Instant::now();
        let episodes = match tokio::time::timeout(self.timeout, self.repository.get_similar(vector, limit)).await {
            Ok(Ok(episodes)) => episodes,
            Ok(Err(e)) => {
                return Err(EvidenceError::Unavailable {
                    origin: EvidenceSource::Episode,
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(EvidenceError::Timeout {
                    origin: EvidenceSource::Episode,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        };

        self.store(key, episodes.clone());
        Ok(Retrieval {
            episodes,
            source: RetrievalSource::Store,
        })
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, key: &str) -> Option<Vec<ScoredEpisode>> {
        let fresh = {
            let entry = self.cache.get(key)?;
            if entry.inserted_at.elapsed() < self.ttl {
                Some(entry.episodes.clone())
            } else {
                None
            }
        };
        if fresh.is_none() {
            self.cache.remove(key);
        }
        fresh
    }

    fn store(&self, key: String, episodes: Vec<ScoredEpisode>) {
        if self.cache.len() >= self.capacity {
            self.evict();
        }
        self.cache.insert(
            key,
            CacheEntry {
                episodes,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries; if none expired, drop the oldest.
    fn evict(&self) {
        let ttl = self.ttl;
        self.cache.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        if self.cache.len() < self.capacity {
            return;
        }
        let oldest = self
            .cache
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.cache.remove(&key);
        }
    }
}

fn cache_key(vector: &[f32], limit: usize) -> String {
    let mut hasher = Sha256::new();
    for v in vector {
        hasher.update(v.to_le_bytes());
    }
    hasher.update((limit as u64).to_le_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::ApplicabilityContext;
    use crate::domain::decision::{BaselineDecision, DecisionSource, ProjectId};
    use crate::domain::episode::{Episode, EpisodeDecision, EpisodeType};
    use crate::domain::repository::EpisodeRepository as _;
    use crate::infrastructure::in_memory_store::InMemoryCortexStore;

    fn config(ttl: Duration) -> RetrievalConfig {
        RetrievalConfig {
            cache_ttl: ttl,
            ..Default::default()
        }
    }

    async fn seeded_store() -> InMemoryCortexStore {
        let store = InMemoryCortexStore::new();
        let baseline = BaselineDecision { task_count: 8, duration_days: 10 };
        let mut episode = Episode::new(
            ProjectId::new(),
            EpisodeType::OrchestrationDecision,
            ApplicabilityContext::default(),
            EpisodeDecision {
                rule_based: baseline,
                final_decision: baseline,
                decision_source: DecisionSource::RuleBasedOnly,
            },
            vec![],
        );
        episode.attach_embedding(vec![1.0, 0.0]);
        store.put(&episode).await.unwrap();
        store
    }

    #[test]
    fn test_cache_key_depends_on_vector_and_limit() {
        assert_eq!(cache_key(&[0.1, 0.2], 5), cache_key(&[0.1, 0.2], 5));
        assert_ne!(cache_key(&[0.1, 0.2], 5), cache_key(&[0.1, 0.3], 5));
        assert_ne!(cache_key(&[0.1, 0.2], 5), cache_key(&[0.1, 0.2], 3));
    }

    #[tokio::test]
    async fn test_second_lookup_hits_cache() {
        let store = seeded_store().await;
        let retriever = EpisodeRetriever::new(Arc::new(store.clone()), &config(Duration::from_secs(3600)));

        let first = retriever.retrieve_detailed(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(first.source, RetrievalSource::Store);
        assert_eq!(first.episodes.len(), 1);

        let second = retriever.retrieve_detailed(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(second.source, RetrievalSource::Cache);
        assert_eq!(second.episodes.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_goes_back_to_store() {
        let store = seeded_store().await;
        let retriever = EpisodeRetriever::new(Arc::new(store), &config(Duration::from_millis(1)));

        retriever.retrieve(&[1.0, 0.0], 5).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let again = retriever.retrieve_detailed(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(again.source, RetrievalSource::Store);
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let store = seeded_store().await;
        let retriever = EpisodeRetriever::new(
            Arc::new(store),
            &RetrievalConfig {
                cache_capacity: 2,
                ..Default::default()
            },
        );

        for i in 0..5 {
            retriever.retrieve(&[1.0, i as f32], 5).await;
        }
        assert!(retriever.cached_entries() <= 2);
    }
}
