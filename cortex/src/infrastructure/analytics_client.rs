// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Analytics collaborator adapters.
//!
//! `HttpAnalyticsClient` reads `GET {base}/projects/{id}/patterns` from the
//! analytics service. `StaticAnalyticsProvider` serves fixed summaries.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::collaborators::{AnalyticsError, AnalyticsProvider, PatternSummary};
use crate::domain::decision::ProjectId;

pub struct HttpAnalyticsClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnalyticsClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AnalyticsError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyticsError::Service(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl AnalyticsProvider for HttpAnalyticsClient {
    async fn get_patterns(&self, project_id: ProjectId) -> Result<PatternSummary, AnalyticsError> {
        let url = format!(
            "{}/projects/{}/patterns",
            self.base_url.trim_end_matches('/'),
            project_id
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                AnalyticsError::Timeout
            } else {
                AnalyticsError::Service(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AnalyticsError::NotFound(project_id));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AnalyticsError::Service(format!("HTTP {}: {}", status, error_text)));
        }

        response
            .json::<PatternSummary>()
            .await
            .map_err(|e| AnalyticsError::Service(format!("Failed to parse response: {}", e)))
    }
}

/// In-process analytics with fixed per-project summaries.
#[derive(Default)]
pub struct StaticAnalyticsProvider {
    summaries: RwLock<HashMap<ProjectId, PatternSummary>>,
}

impl StaticAnalyticsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, summary: PatternSummary) {
        self.summaries.write().await.insert(summary.project_id, summary);
    }
}

#[async_trait]
impl AnalyticsProvider for StaticAnalyticsProvider {
    async fn get_patterns(&self, project_id: ProjectId) -> Result<PatternSummary, AnalyticsError> {
        self.summaries
            .read()
            .await
            .get(&project_id)
            .cloned()
            .ok_or(AnalyticsError::NotFound(project_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collaborators::AnalyticsRecommendation;
    use crate::domain::decision::{DecisionField, RecommendedAction};

    #[tokio::test]
    async fn test_http_get_patterns() {
        let project_id = ProjectId::new();
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "project_id": project_id,
            "sample_size": 24,
            "reference": "velocity-90d",
            "recommendations": [
                {
                    "action": { "field": "task_count", "value": { "absolute": 7.0 } },
                    "confidence": 0.65
                }
            ]
        });
        let mock = server
            .mock("GET", format!("/projects/{}/patterns", project_id).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = HttpAnalyticsClient::new(server.url(), Duration::from_secs(1)).unwrap();
        let summary = client.get_patterns(project_id).await.unwrap();

        assert_eq!(summary.sample_size, 24);
        assert_eq!(summary.reference.as_deref(), Some("velocity-90d"));
        assert_eq!(
            summary.recommendations[0].action,
            RecommendedAction::absolute(DecisionField::TaskCount, 7.0)
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_not_found() {
        let project_id = ProjectId::new();
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", format!("/projects/{}/patterns", project_id).as_str())
            .with_status(404)
            .create_async()
            .await;

        let client = HttpAnalyticsClient::new(server.url(), Duration::from_secs(1)).unwrap();
        let err = client.get_patterns(project_id).await.unwrap_err();

        assert!(matches!(err, AnalyticsError::NotFound(id) if id == project_id));
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticAnalyticsProvider::new();
        let project_id = ProjectId::new();
        provider
            .insert(PatternSummary {
                project_id,
                sample_size: 10,
                recommendations: vec![AnalyticsRecommendation {
                    action: RecommendedAction::relative(DecisionField::DurationDays, 1.2),
                    confidence: 0.6,
                }],
                reference: None,
                average_velocity: Some(21.5),
                completion_rate: None,
            })
            .await;

        assert_eq!(provider.get_patterns(project_id).await.unwrap().sample_size, 10);
        assert!(provider.get_patterns(ProjectId::new()).await.is_err());
    }
}
