//! Ollama 로컬 LLM (`POST {base}/api/generate`, 스트리밍 없음)

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{error_message, http_client, AnswerGenerator, GenerationError, TEMPERATURE};

#[derive(Debug)]
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    /// # Arguments
    /// * `base_url` - Ollama 서버 주소 (예: http://localhost:11434)
    /// * `model` - 모델 이름 (예: qwen2:7b)
    /// * `timeout` - 요청 타임아웃
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&GenerateRequest {
                model: &self.model,
                system,
                prompt: user,
                stream: false,
                options: GenerateOptions {
                    temperature: TEMPERATURE,
                },
            })
            .send()
            .await
            .map_err(GenerationError::from_transport)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(GenerationError::from_transport)?;
        if !status.is_success() {
            return Err(GenerationError::from_status(status.as_u16(), error_message(&body)));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        Ok(parsed.response)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
