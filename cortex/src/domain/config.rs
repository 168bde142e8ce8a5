// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cortex Configuration
//!
//! Tunables of the decision core, loaded from YAML:
//! - latency budgets of the retrieval branches
//! - combiner, modifier and gate thresholds
//! - episode logger retry policy and embedding backfill
//! - evolution pipeline and learning optimizer parameters
//! - storage, embedding provider and analytics endpoints
//!
//! Durations are humantime strings ("300ms", "1h", "30d").

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::repository::{PostgresConfig, StorageBackend};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CortexConfig {
    #[serde(default)]
    pub decision: DecisionConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub combiner: CombinerConfig,

    #[serde(default)]
    pub modifier: ModifierConfig,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub evolution: EvolutionConfig,

    #[serde(default)]
    pub backfill: BackfillConfig,

    #[serde(default)]
    pub storage: StorageBackend,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Soft budget of a whole decision; exceeding it is logged, never fatal.
    #[serde(default = "default_soft_budget", with = "humantime_serde")]
    pub soft_budget: Duration,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self { soft_budget: default_soft_budget() }
    }
}

/// Episode retriever and memory bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_limit")]
    pub limit: usize,

    #[serde(default = "default_cache_ttl", with = "humantime_serde")]
    pub cache_ttl: Duration,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Store query timeout.
    #[serde(default = "default_retrieval_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Timeout for embedding the query context.
    #[serde(default = "default_query_embedding_timeout", with = "humantime_serde")]
    pub embedding_timeout: Duration,

    #[serde(default = "default_max_insights")]
    pub max_insights: usize,

    /// Episode count at which influence reaches ~63% of its ceiling.
    #[serde(default = "default_influence_saturation")]
    pub influence_saturation: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_retrieval_limit(),
            cache_ttl: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            timeout: default_retrieval_timeout(),
            embedding_timeout: default_query_embedding_timeout(),
            max_insights: default_max_insights(),
            influence_saturation: default_influence_saturation(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_min_strategy_confidence")]
    pub min_confidence: f64,

    #[serde(default = "default_matching_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_max_strategies")]
    pub max_strategies: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_strategy_confidence(),
            timeout: default_matching_timeout(),
            max_strategies: default_max_strategies(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinerConfig {
    /// Applicability above which the best strategy dominates.
    #[serde(default = "default_dominance_threshold")]
    pub dominance_threshold: f64,
}

impl Default for CombinerConfig {
    fn default() -> Self {
        Self { dominance_threshold: default_dominance_threshold() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierConfig {
    /// Smallest absolute change worth proposing.
    #[serde(default = "default_min_absolute_change")]
    pub min_absolute_change: f64,

    /// Smallest change relative to the baseline worth proposing.
    #[serde(default = "default_min_relative_change")]
    pub min_relative_change: f64,
}

impl Default for ModifierConfig {
    fn default() -> Self {
        Self {
            min_absolute_change: default_min_absolute_change(),
            min_relative_change: default_min_relative_change(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_gate_confidence")]
    pub confidence_threshold: f64,

    #[serde(default = "default_min_evidence")]
    pub min_evidence: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_gate_confidence(),
            min_evidence: default_min_evidence(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_logger_embedding_timeout", with = "humantime_serde")]
    pub embedding_timeout: Duration,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay", with = "humantime_serde")]
    pub retry_base_delay: Duration,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            embedding_timeout: default_logger_embedding_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay: default_retry_base_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    #[serde(default = "default_min_outcome_quality")]
    pub min_outcome_quality: f64,

    #[serde(default = "default_lookback", with = "humantime_serde")]
    pub lookback_window: Duration,

    #[serde(default = "default_min_episodes")]
    pub min_episodes_per_pattern: usize,

    /// Largest outcome-quality standard deviation of a consistent group.
    #[serde(default = "default_max_quality_stddev")]
    pub max_quality_stddev: f64,

    /// Episodes below this quality contradict a pattern.
    #[serde(default = "default_contradiction_quality")]
    pub contradiction_quality: f64,

    #[serde(default = "default_evolution_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_max_confidence_step")]
    pub max_confidence_step: f64,

    #[serde(default = "default_deactivation_threshold")]
    pub deactivation_threshold: f64,

    /// Observed outcomes required before a strategy can be deactivated.
    #[serde(default = "default_min_applications")]
    pub min_applications: u64,

    /// Outcome quality at or above which an application counts as a success.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            min_outcome_quality: default_min_outcome_quality(),
            lookback_window: default_lookback(),
            min_episodes_per_pattern: default_min_episodes(),
            max_quality_stddev: default_max_quality_stddev(),
            contradiction_quality: default_contradiction_quality(),
            interval: default_evolution_interval(),
            learning_rate: default_learning_rate(),
            max_confidence_step: default_max_confidence_step(),
            deactivation_threshold: default_deactivation_threshold(),
            min_applications: default_min_applications(),
            success_threshold: default_success_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    #[serde(default = "default_backfill_window", with = "humantime_serde")]
    pub window: Duration,

    #[serde(default = "default_backfill_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_backfill_batch")]
    pub batch_size: usize,

    #[serde(default = "default_logger_embedding_timeout", with = "humantime_serde")]
    pub embedding_timeout: Duration,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            window: default_backfill_window(),
            interval: default_backfill_interval(),
            batch_size: default_backfill_batch(),
            embedding_timeout: default_logger_embedding_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Deterministic offline embedder.
    Hash,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProviderKind,

    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_http_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            timeout: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Base URL of the analytics service. Analytics are skipped when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_retrieval_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self { url: None, timeout: default_retrieval_timeout() }
    }
}

fn default_soft_budget() -> Duration {
    Duration::from_millis(500)
}

fn default_retrieval_limit() -> usize {
    5
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_retrieval_timeout() -> Duration {
    Duration::from_millis(300)
}

fn default_query_embedding_timeout() -> Duration {
    Duration::from_millis(150)
}

fn default_max_insights() -> usize {
    3
}

fn default_influence_saturation() -> f64 {
    2.0
}

fn default_min_strategy_confidence() -> f64 {
    0.5
}

fn default_matching_timeout() -> Duration {
    Duration::from_millis(100)
}

fn default_max_strategies() -> usize {
    10
}

fn default_dominance_threshold() -> f64 {
    0.75
}

fn default_min_absolute_change() -> f64 {
    1.0
}

fn default_min_relative_change() -> f64 {
    0.05
}

fn default_gate_confidence() -> f64 {
    0.5
}

fn default_min_evidence() -> usize {
    3
}

fn default_logger_embedding_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_min_outcome_quality() -> f64 {
    0.85
}

fn default_lookback() -> Duration {
    Duration::from_secs(30 * 24 * 3600)
}

fn default_min_episodes() -> usize {
    3
}

fn default_max_quality_stddev() -> f64 {
    0.1
}

fn default_contradiction_quality() -> f64 {
    0.5
}

fn default_evolution_interval() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_learning_rate() -> f64 {
    0.3
}

fn default_max_confidence_step() -> f64 {
    0.2
}

fn default_deactivation_threshold() -> f64 {
    0.3
}

fn default_min_applications() -> u64 {
    5
}

fn default_success_threshold() -> f64 {
    0.7
}

fn default_backfill_window() -> Duration {
    Duration::from_secs(7 * 24 * 3600)
}

fn default_backfill_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_backfill_batch() -> usize {
    100
}

fn default_embedding_provider() -> EmbeddingProviderKind {
    EmbeddingProviderKind::Hash
}

fn default_embedding_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_dimensions() -> usize {
    768
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(2)
}

impl CortexConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load from an optional path, falling back to defaults, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading configuration from {:?}", path);
                Self::from_yaml_file(path)
                    .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?
            }
            None => {
                tracing::debug!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Deployment values from the environment win over the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("HELM_DATABASE_URL").filter(|v| !v.is_empty()) {
            tracing::info!("Environment override: HELM_DATABASE_URL");
            let max_connections = match &self.storage {
                StorageBackend::PostgreSQL(pg) => pg.max_connections,
                StorageBackend::InMemory => PostgresConfig::DEFAULT_MAX_CONNECTIONS,
            };
            self.storage = StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: url,
                max_connections,
            });
        }

        if let Some(url) = lookup("HELM_EMBEDDING_URL").filter(|v| !v.is_empty()) {
            tracing::info!("Environment override: HELM_EMBEDDING_URL={}", url);
            self.embedding.provider = EmbeddingProviderKind::Ollama;
            self.embedding.url = url;
        }

        if let Some(url) = lookup("HELM_ANALYTICS_URL").filter(|v| !v.is_empty()) {
            tracing::info!("Environment override: HELM_ANALYTICS_URL={}", url);
            self.analytics.url = Some(url);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let unit = [
            ("matching.min_confidence", self.matching.min_confidence),
            ("combiner.dominance_threshold", self.combiner.dominance_threshold),
            ("modifier.min_relative_change", self.modifier.min_relative_change),
            ("gate.confidence_threshold", self.gate.confidence_threshold),
            ("evolution.min_outcome_quality", self.evolution.min_outcome_quality),
            ("evolution.max_quality_stddev", self.evolution.max_quality_stddev),
            ("evolution.contradiction_quality", self.evolution.contradiction_quality),
            ("evolution.learning_rate", self.evolution.learning_rate),
            ("evolution.max_confidence_step", self.evolution.max_confidence_step),
            ("evolution.deactivation_threshold", self.evolution.deactivation_threshold),
            ("evolution.success_threshold", self.evolution.success_threshold),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within [0, 1], got {}", name, value);
            }
        }

        if self.evolution.contradiction_quality >= self.evolution.min_outcome_quality {
            anyhow::bail!(
                "evolution.contradiction_quality ({}) must be below evolution.min_outcome_quality ({})",
                self.evolution.contradiction_quality,
                self.evolution.min_outcome_quality
            );
        }

        if self.modifier.min_absolute_change < 0.0 {
            anyhow::bail!("modifier.min_absolute_change cannot be negative");
        }
        if self.retrieval.influence_saturation <= 0.0 {
            anyhow::bail!("retrieval.influence_saturation must be positive");
        }

        let limits = [
            ("retrieval.limit", self.retrieval.limit),
            ("retrieval.cache_capacity", self.retrieval.cache_capacity),
            ("matching.max_strategies", self.matching.max_strategies),
            ("gate.min_evidence", self.gate.min_evidence),
            ("evolution.min_episodes_per_pattern", self.evolution.min_episodes_per_pattern),
            ("backfill.batch_size", self.backfill.batch_size),
            ("embedding.dimensions", self.embedding.dimensions),
        ];
        for (name, value) in limits {
            if value == 0 {
                anyhow::bail!("{} cannot be zero", name);
            }
        }

        let durations = [
            ("decision.soft_budget", self.decision.soft_budget),
            ("retrieval.timeout", self.retrieval.timeout),
            ("retrieval.embedding_timeout", self.retrieval.embedding_timeout),
            ("matching.timeout", self.matching.timeout),
            ("logger.embedding_timeout", self.logger.embedding_timeout),
            ("evolution.lookback_window", self.evolution.lookback_window),
            ("evolution.interval", self.evolution.interval),
            ("backfill.window", self.backfill.window),
            ("backfill.interval", self.backfill.interval),
            ("backfill.embedding_timeout", self.backfill.embedding_timeout),
            ("embedding.timeout", self.embedding.timeout),
            ("analytics.timeout", self.analytics.timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                anyhow::bail!("{} cannot be zero", name);
            }
        }

        if let StorageBackend::PostgreSQL(pg) = &self.storage {
            if pg.connection_string.is_empty() {
                anyhow::bail!("storage.connection_string cannot be empty");
            }
        }
        if self.embedding.provider == EmbeddingProviderKind::Ollama && self.embedding.url.is_empty() {
            anyhow::bail!("embedding.url cannot be empty for the ollama provider");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = CortexConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.limit, 5);
        assert_eq!(config.retrieval.timeout, Duration::from_millis(300));
        assert_eq!(config.matching.timeout, Duration::from_millis(100));
        assert_eq!(config.gate.confidence_threshold, 0.5);
        assert_eq!(config.evolution.min_outcome_quality, 0.85);
        assert_eq!(config.storage, StorageBackend::InMemory);
    }

    #[test]
    fn test_partial_yaml_with_humantime_durations() {
        let yaml = r#"
retrieval:
  cache_ttl: 10m
  timeout: 250ms
gate:
  min_evidence: 5
evolution:
  lookback_window: 14d
storage:
  backend: postgres
  connection_string: postgres://helm@localhost/helm
"#;
        let config = CortexConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.retrieval.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.retrieval.timeout, Duration::from_millis(250));
        assert_eq!(config.retrieval.limit, 5);
        assert_eq!(config.gate.min_evidence, 5);
        assert_eq!(config.evolution.lookback_window, Duration::from_secs(14 * 24 * 3600));
        match config.storage {
            StorageBackend::PostgreSQL(pg) => {
                assert_eq!(pg.connection_string, "postgres://helm@localhost/helm");
                assert_eq!(pg.max_connections, PostgresConfig::DEFAULT_MAX_CONNECTIONS);
            }
            other => panic!("unexpected backend {:?}", other),
        }
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "matching:\n  min_confidence: 0.6").unwrap();
        let config = CortexConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.matching.min_confidence, 0.6);
    }

    #[test]
    fn test_validation() {
        let mut config = CortexConfig::default();

        config.gate.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
        config.gate.confidence_threshold = 0.5;

        config.retrieval.limit = 0;
        assert!(config.validate().is_err());
        config.retrieval.limit = 5;

        config.matching.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.matching.timeout = Duration::from_millis(100);

        config.evolution.contradiction_quality = 0.9;
        assert!(config.validate().is_err());
        config.evolution.contradiction_quality = 0.5;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("HELM_DATABASE_URL", "postgres://db/helm"),
            ("HELM_EMBEDDING_URL", "http://ollama:11434"),
            ("HELM_ANALYTICS_URL", "http://analytics:8080"),
        ]);
        let mut config = CortexConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert!(matches!(config.storage, StorageBackend::PostgreSQL(ref pg) if pg.connection_string == "postgres://db/helm"));
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Ollama);
        assert_eq!(config.embedding.url, "http://ollama:11434");
        assert_eq!(config.analytics.url.as_deref(), Some("http://analytics:8080"));
    }
}
