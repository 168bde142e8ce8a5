// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Interfaces of the external collaborators consumed by the decision core:
//! the text-embedding provider and the long-horizon analytics service.
//! Implementations live in `crate::infrastructure`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::decision::{ProjectId, RecommendedAction};

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding request timed out")]
    Timeout,

    #[error("Embedding provider error: {0}")]
    Provider(String),

    #[error("Embedding network error: {0}")]
    Network(String),

    #[error("Embedding has {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },
}

/// Converts text into a fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimensions(&self) -> usize;
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Analytics request timed out")]
    Timeout,

    #[error("No analytics for project {0}")]
    NotFound(ProjectId),

    #[error("Analytics service error: {0}")]
    Service(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecommendation {
    pub action: RecommendedAction,
    pub confidence: f64,
}

/// Statistical pattern summary for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub project_id: ProjectId,
    /// Number of historical sprints/iterations behind the summary.
    pub sample_size: usize,
    #[serde(default)]
    pub recommendations: Vec<AnalyticsRecommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_velocity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_rate: Option<f64>,
}

/// Long-horizon analytics over a project's history.
#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
    async fn get_patterns(&self, project_id: ProjectId) -> Result<PatternSummary, AnalyticsError>;
}
