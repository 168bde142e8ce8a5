// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedding Client
//!
//! Adapters for the [`EmbeddingProvider`] interface.
//!
//! - [`OllamaEmbeddingClient`] calls a local Ollama server (`POST /api/embeddings`).
//! - [`HashEmbeddingClient`] is a deterministic bag-of-words embedder for
//!   development and tests. Texts sharing tokens get a positive cosine.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Anti-corruption layer over the embedding model

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::domain::collaborators::{EmbeddingError, EmbeddingProvider};

pub struct OllamaEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbeddingClient {
    pub fn new(endpoint: String, model: String, dimensions: usize, timeout: Duration) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::Provider(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            model,
            dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/api/embeddings", self.endpoint.trim_end_matches('/'));
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else {
                    EmbeddingError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Provider(format!("HTTP {}: {}", status, error_text)));
        }

        let body: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Provider(format!("Failed to parse response: {}", e)))?;

        if body.embedding.len() != self.dimensions {
            return Err(EmbeddingError::Dimension {
                expected: self.dimensions,
                actual: body.embedding.len(),
            });
        }

        Ok(body.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Deterministic offline embedder.
///
/// Each lowercase alphanumeric token is hashed into a signed bucket; the
/// result is L2-normalized. Empty text embeds to the zero vector.
pub struct HashEmbeddingClient {
    dimensions: usize,
}

impl HashEmbeddingClient {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbeddingClient {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory_store::cosine_similarity;

    #[test]
    fn test_hash_embedding_is_deterministic() {
        let client = HashEmbeddingClient::default();
        let a = tokio_test::block_on(client.embed("team medium | velocity decreasing")).unwrap();
        let b = tokio_test::block_on(client.embed("team medium | velocity decreasing")).unwrap();

        assert_eq!(a.len(), 384);
        assert_eq!(a, b, "Same text should produce same embedding");
    }

    #[tokio::test]
    async fn test_hash_embedding_similarity_tracks_overlap() {
        let client = HashEmbeddingClient::default();
        let base = client.embed("team medium | velocity decreasing | phase execution").await.unwrap();
        let close = client.embed("team medium | velocity decreasing | phase closing").await.unwrap();
        let far = client.embed("backlog 400 | sprint_length 21").await.unwrap();

        assert!(cosine_similarity(&base, &close) > cosine_similarity(&base, &far));
        assert!((cosine_similarity(&base, &base) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_ollama_embedding() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embeddings")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "nomic-embed-text"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"embedding": [0.1, 0.2, 0.3]}"#)
            .create_async()
            .await;

        let client = OllamaEmbeddingClient::new(
            server.url(),
            "nomic-embed-text".to_string(),
            3,
            Duration::from_secs(2),
        )
        .unwrap();
        let embedding = client.embed("team small").await.unwrap();

        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ollama_dimension_mismatch() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"embedding": [0.1, 0.2]}"#)
            .create_async()
            .await;

        let client =
            OllamaEmbeddingClient::new(server.url(), "m".to_string(), 3, Duration::from_secs(2)).unwrap();
        let err = client.embed("x").await.unwrap_err();

        assert!(matches!(err, EmbeddingError::Dimension { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn test_ollama_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/embeddings")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let client =
            OllamaEmbeddingClient::new(server.url(), "m".to_string(), 3, Duration::from_secs(2)).unwrap();
        let err = client.embed("x").await.unwrap_err();

        assert!(matches!(err, EmbeddingError::Provider(msg) if msg.contains("500")));
    }
}
