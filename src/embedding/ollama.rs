//! Ollama 로컬 임베딩 프로바이더
//!
//! `POST {base}/api/embeddings` (`{"model", "prompt"}` → `{"embedding": [...]}`)

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;

/// bge-m3 출력 차원
pub const BGE_M3_DIMENSION: usize = 1024;

/// Ollama 임베딩 구현체
#[derive(Debug)]
pub struct OllamaEmbedding {
    base_url: String,
    model: String,
    dimension: usize,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// # Arguments
    /// * `base_url` - Ollama 서버 주소 (예: http://localhost:11434)
    /// * `model` - 임베딩 모델 이름 (예: bge-m3)
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            dimension: BGE_M3_DIMENSION,
            client,
        })
    }

    /// 모델 출력 차원 지정 (bge-m3 외 모델)
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingsRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .with_context(|| format!("Failed to reach Ollama at {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama embedding error ({}): {}", status, body);
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .context("Failed to parse Ollama embedding response")?;
        if parsed.embedding.len() != self.dimension {
            anyhow::bail!(
                "Ollama model {} returned {} dimensions, expected {}",
                self.model,
                parsed.embedding.len(),
                self.dimension
            );
        }
        Ok(parsed.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}
