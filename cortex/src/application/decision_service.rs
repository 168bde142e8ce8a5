// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Decision Service
//!
//! Orchestrates one intelligence-enhanced decision:
//!
//! ```text
//!            ┌─ strategy matcher ───────────────┐
//! request ───┼─ embed → retriever → bridge ─────┼─▶ combiner ─▶ modifier ─▶ gate ─▶ response
//!            └─ analytics collaborator ─────────┘                                     │
//!                                                                     episode logger ◀┘ (background)
//! ```
//!
//! The three branches run concurrently under their own timeouts and are
//! joined, never raced. A failed branch contributes nothing; the caller
//! always gets a decision, in the worst case the untouched baseline.

use chrono::Utc;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::confidence_gate::ConfidenceGate;
use crate::application::decision_modifier::DecisionModifier;
use crate::application::episode_logger::{EpisodeLogEntry, EpisodeLogger, StrategyApplication};
use crate::application::episode_retriever::EpisodeRetriever;
use crate::application::memory_bridge::MemoryBridge;
use crate::application::pattern_combiner::PatternCombiner;
use crate::application::strategy_matcher::StrategyMatcher;
use crate::domain::adjustment::{DecisionStateError, FieldDecision, ProposedAdjustment};
use crate::domain::collaborators::{AnalyticsProvider, EmbeddingProvider, PatternSummary};
use crate::domain::config::CortexConfig;
use crate::domain::decision::{
    DecisionBlock, DecisionField, DecisionRequest, DecisionResponse, DecisionSource, EpisodeContextBlock,
    IntelligenceAdjustment, StrategyContextBlock,
};
use crate::domain::episode::ScoredEpisode;
use crate::domain::events::CortexEvent;
use crate::domain::pattern::{EvidenceError, EvidenceSource};
use crate::domain::repository::{EpisodeRepository, StrategyRepository};
use crate::domain::strategy::StrategyMatch;
use crate::infrastructure::event_bus::EventBus;

pub struct DecisionService {
    retriever: Arc<EpisodeRetriever>,
    bridge: MemoryBridge,
    matcher: StrategyMatcher,
    embedder: Arc<dyn EmbeddingProvider>,
    analytics: Option<Arc<dyn AnalyticsProvider>>,
    combiner: PatternCombiner,
    modifier: DecisionModifier,
    gate: ConfidenceGate,
    logger: Option<Arc<EpisodeLogger>>,
    event_bus: Arc<EventBus>,
    query_embedding_timeout: Duration,
    analytics_timeout: Duration,
    soft_budget: Duration,
}

impl DecisionService {
    pub fn new(
        config: &CortexConfig,
        episodes: Arc<dyn EpisodeRepository>,
        strategies: Arc<dyn StrategyRepository>,
        embedder: Arc<dyn EmbeddingProvider>,
        analytics: Option<Arc<dyn AnalyticsProvider>>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            retriever: Arc::new(EpisodeRetriever::new(episodes, &config.retrieval)),
            bridge: MemoryBridge::new(&config.retrieval),
            matcher: StrategyMatcher::new(strategies, &config.matching),
            embedder,
            analytics,
            combiner: PatternCombiner::new(&config.combiner),
            modifier: DecisionModifier::new(&config.modifier),
            gate: ConfidenceGate::new(&config.gate),
            logger: None,
            event_bus,
            query_embedding_timeout: config.retrieval.embedding_timeout,
            analytics_timeout: config.analytics.timeout,
            soft_budget: config.decision.soft_budget,
        }
    }

    /// Persist every decision through `logger` in the background.
    pub fn with_logger(mut self, logger: Arc<EpisodeLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn retriever(&self) -> Arc<EpisodeRetriever> {
        Arc::clone(&self.retriever)
    }

    pub async fn decide(&self, request: DecisionRequest) -> DecisionResponse {
        self.decide_with_cancellation(request, CancellationToken::new()).await
    }

    /// Like [`decide`](Self::decide); cancelling `cancel` stops the
    /// retrieval branches, and the baseline-only decision is returned.
    pub async fn decide_with_cancellation(&self, request: DecisionRequest, cancel: CancellationToken) -> DecisionResponse {
        let started = Instant::now();
        debug!(project_id = %request.project_id, "Evaluating decision request");

        let (strategies, episodes, analytics) = tokio::join!(
            guarded(&cancel, EvidenceSource::Strategy, self.strategy_branch(&request)),
            guarded(&cancel, EvidenceSource::Episode, self.episode_branch(&request)),
            guarded(&cancel, EvidenceSource::Analytics, self.analytics_branch(&request)),
        );

        let strategy_available = strategies.is_ok();
        let episode_available = episodes.is_ok();
        let matches = evidence_or_default(strategies);
        let episodes = evidence_or_default(episodes);
        let analytics = evidence_or_default(analytics);

        let memory = self.bridge.build_context(&episodes);
        let patterns = self
            .combiner
            .combine(&request.baseline, &matches, &memory, analytics.as_ref());
        let proposals = self.modifier.propose(&request.baseline, &patterns);

        let mut final_decision = request.baseline;
        let mut adjustments = BTreeMap::new();
        let mut accepted: Vec<ProposedAdjustment> = Vec::new();

        for field in DecisionField::ALL {
            let mut state = FieldDecision::new(field, request.baseline.get(field));
            let proposal = proposals.iter().find(|p| p.field == field).cloned();

            if let Err(e) = self.settle(&mut state, proposal.clone(), &request) {
                error!(field = %field, error = %e, "Decision state machine rejected transition, keeping baseline");
                continue;
            }

            if state.is_overridden() {
                if let Some(value) = state.final_value() {
                    final_decision = final_decision.with(field, value);
                }
            }

            if let Some(p) = proposal {
                let applied = state.is_overridden();
                adjustments.insert(
                    field,
                    IntelligenceAdjustment {
                        original: p.original,
                        recommended: p.recommended,
                        applied,
                        confidence: p.confidence,
                        evidence_source: p.dominant_source,
                        evidence_volume: p.evidence_volume,
                        decision_source: field_source(applied, p.dominant_source),
                        rationale: p.rationale.clone(),
                        gate_reason: state.verdict_reason().unwrap_or_default().to_string(),
                    },
                );
                if applied {
                    accepted.push(p);
                }
            }
        }

        let decision_source = overall_source(&accepted);

        let mut applied_strategies: Vec<Uuid> = accepted
            .iter()
            .flat_map(|p| p.evidence.strategy_ids.iter().map(|id| id.0))
            .collect();
        applied_strategies.sort();
        applied_strategies.dedup();

        let mut applied_episodes: Vec<_> = accepted.iter().flat_map(|p| p.evidence.episode_ids.iter().copied()).collect();
        applied_episodes.sort();
        applied_episodes.dedup();

        let response = DecisionResponse {
            decision_id: Uuid::new_v4(),
            project_id: request.project_id,
            decided_at: Utc::now(),
            decisions: DecisionBlock {
                decision_source,
                rule_based_decision: request.baseline,
                final_decision,
                intelligence_adjustments: adjustments,
            },
            strategy_context: StrategyContextBlock {
                available: strategy_available,
                strategies_evaluated: matches.len(),
                strategies_applied: applied_strategies.len(),
                applied_strategy_ids: applied_strategies,
            },
            episode_context: EpisodeContextBlock {
                available: episode_available,
                episodes_evaluated: memory.episode_count,
                episodes_applied: applied_episodes.len(),
                average_similarity: memory.average_similarity,
                influence_score: memory.episode_influence_score,
                key_insights: memory.key_insights.clone(),
            },
            analytics_available: analytics.is_some(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if let Some(logger) = &self.logger {
            logger.submit(EpisodeLogEntry {
                request: request.clone(),
                final_decision,
                decision_source,
                patterns: patterns.snapshot(),
                applications: strategy_applications(&accepted, &matches),
            });
        }

        let elapsed = started.elapsed();
        metrics::histogram!("helm_decision_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
        if elapsed > self.soft_budget {
            warn!(
                project_id = %request.project_id,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.soft_budget.as_millis() as u64,
                "Decision exceeded soft latency budget"
            );
        }
        info!(
            project_id = %request.project_id,
            decision_source = %decision_source,
            strategies = response.strategy_context.strategies_evaluated,
            episodes = response.episode_context.episodes_evaluated,
            duration_ms = response.duration_ms,
            "Decision completed"
        );

        response
    }

    /// Walk one field through propose → gate → finalize.
    fn settle(
        &self,
        state: &mut FieldDecision,
        proposal: Option<ProposedAdjustment>,
        request: &DecisionRequest,
    ) -> Result<(), DecisionStateError> {
        if let Some(proposal) = proposal {
            let verdict = self.gate.evaluate(&proposal);
            self.event_bus.publish(CortexEvent::AdjustmentGated {
                project_id: request.project_id,
                field: proposal.field,
                accepted: verdict.accepted,
                confidence: proposal.confidence,
                evidence_volume: proposal.evidence_volume,
                dominant_source: proposal.dominant_source,
                timestamp: Utc::now(),
            });
            debug!(field = %proposal.field, accepted = verdict.accepted, reason = %verdict.reason, "Adjustment gated");
            state.propose(proposal)?;
            state.apply_verdict(verdict)?;
        }
        state.finalize()?;
        Ok(())
    }

    async fn strategy_branch(&self, request: &DecisionRequest) -> Result<Vec<StrategyMatch>, EvidenceError> {
        self.matcher
            .match_detailed(&request.context, self.matcher.default_min_confidence())
            .await
    }

    async fn episode_branch(&self, request: &DecisionRequest) -> Result<Vec<ScoredEpisode>, EvidenceError> {
        let started = Instant::now();
        let text = request.embedding_text();
        let vector = match tokio::time::timeout(self.query_embedding_timeout, self.embedder.embed(&text)).await {
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => {
                return Err(EvidenceError::Unavailable {
                    origin: EvidenceSource::Episode,
                    message: format!("query embedding failed: {}", e),
                })
            }
            Err(_) => {
                return Err(EvidenceError::Timeout {
                    origin: EvidenceSource::Episode,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        };

        let retrieval = self
            .retriever
            .retrieve_detailed(&vector, self.retriever.default_limit())
            .await?;
        Ok(retrieval.episodes)
    }

    async fn analytics_branch(&self, request: &DecisionRequest) -> Result<Option<PatternSummary>, EvidenceError> {
        let Some(provider) = &self.analytics else {
            return Ok(None);
        };
        let started = Instant::now();
        match tokio::time::timeout(self.analytics_timeout, provider.get_patterns(request.project_id)).await {
            Ok(Ok(summary)) => Ok(Some(summary)),
            Ok(Err(e)) => Err(EvidenceError::Unavailable {
                origin: EvidenceSource::Analytics,
                message: e.to_string(),
            }),
            Err(_) => Err(EvidenceError::Timeout {
                origin: EvidenceSource::Analytics,
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
        }
    }
}

/// Run a branch unless the caller cancels first.
async fn guarded<T>(
    cancel: &CancellationToken,
    origin: EvidenceSource,
    branch: impl Future<Output = Result<T, EvidenceError>>,
) -> Result<T, EvidenceError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EvidenceError::Cancelled(origin)),
        result = branch => result,
    }
}

fn evidence_or_default<T: Default>(result: Result<T, EvidenceError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            metrics::counter!("helm_evidence_unavailable_total", "source" => e.origin().as_str()).increment(1);
            warn!(source = %e.origin(), error = %e, "Evidence source degraded to zero confidence");
            T::default()
        }
    }
}

fn field_source(applied: bool, dominant: EvidenceSource) -> DecisionSource {
    match (applied, dominant) {
        (false, _) => DecisionSource::RuleBasedOnly,
        (true, EvidenceSource::Strategy) => DecisionSource::StrategyEnhanced,
        (true, _) => DecisionSource::IntelligenceEnhanced,
    }
}

fn overall_source(accepted: &[ProposedAdjustment]) -> DecisionSource {
    if accepted.is_empty() {
        DecisionSource::RuleBasedOnly
    } else if accepted.iter().any(|p| p.dominant_source == EvidenceSource::Strategy) {
        DecisionSource::StrategyEnhanced
    } else {
        DecisionSource::IntelligenceEnhanced
    }
}

/// Accepted adjustments backed by a matched strategy, one per strategy and
/// field.
fn strategy_applications(accepted: &[ProposedAdjustment], matches: &[StrategyMatch]) -> Vec<StrategyApplication> {
    accepted
        .iter()
        .flat_map(|p| {
            p.evidence.strategy_ids.iter().filter_map(move |id| {
                let strategy = &matches.iter().find(|m| m.strategy.id == *id)?.strategy;
                Some(StrategyApplication {
                    strategy_id: strategy.id,
                    field: p.field,
                    action: strategy.content.action,
                    recommended_value: p.recommended,
                    expected_quality: strategy.success_rate().unwrap_or(strategy.confidence),
                    strategy_confidence: strategy.confidence,
                    context_centroid: strategy.content.context_centroid.clone(),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::ApplicabilityContext;
    use crate::domain::decision::{BaselineDecision, ProjectId};
    use crate::infrastructure::embedding_client::HashEmbeddingClient;
    use crate::infrastructure::in_memory_store::InMemoryCortexStore;

    fn service(store: &InMemoryCortexStore, bus: Arc<EventBus>) -> DecisionService {
        DecisionService::new(
            &CortexConfig::default(),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(HashEmbeddingClient::new(32)),
            None,
            bus,
        )
    }

    fn request() -> DecisionRequest {
        DecisionRequest::new(
            ProjectId::new(),
            BaselineDecision { task_count: 8, duration_days: 10 },
            ApplicabilityContext::default(),
        )
    }

    #[tokio::test]
    async fn test_empty_stores_keep_baseline() {
        let store = InMemoryCortexStore::new();
        let response = service(&store, Arc::new(EventBus::with_default_capacity()))
            .decide(request())
            .await;

        assert_eq!(response.decisions.decision_source, DecisionSource::RuleBasedOnly);
        assert_eq!(response.decisions.final_decision, response.decisions.rule_based_decision);
        assert!(response.decisions.intelligence_adjustments.is_empty());
        assert!(response.strategy_context.available);
        assert!(response.episode_context.available);
        assert!(!response.analytics_available);
    }

    #[tokio::test]
    async fn test_cancelled_request_returns_baseline() {
        let store = InMemoryCortexStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let response = service(&store, Arc::new(EventBus::with_default_capacity()))
            .decide_with_cancellation(request(), cancel)
            .await;

        assert_eq!(response.decisions.decision_source, DecisionSource::RuleBasedOnly);
        assert!(!response.strategy_context.available);
        assert!(!response.episode_context.available);
    }

    #[test]
    fn test_overall_source_prefers_strategy() {
        use crate::domain::adjustment::EvidenceReferences;
        let proposal = |source| ProposedAdjustment {
            field: DecisionField::TaskCount,
            original: 8.0,
            recommended: 6.0,
            confidence: 0.8,
            evidence_volume: 4,
            dominant_source: source,
            rationale: String::new(),
            evidence: EvidenceReferences::default(),
        };
        assert_eq!(overall_source(&[]), DecisionSource::RuleBasedOnly);
        assert_eq!(
            overall_source(&[proposal(EvidenceSource::Episode)]),
            DecisionSource::IntelligenceEnhanced
        );
        assert_eq!(
            overall_source(&[proposal(EvidenceSource::Episode), proposal(EvidenceSource::Strategy)]),
            DecisionSource::StrategyEnhanced
        );
    }
}
