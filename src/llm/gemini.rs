//! Gemini LLM (`generateContent`)
//!
//! source: https://ai.google.dev/api/generate-content

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{error_message, http_client, AnswerGenerator, GenerationError, TEMPERATURE};

/// Gemini API 베이스 URL
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug)]
pub struct GeminiGenerator {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key,
            model: model.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            client: http_client(timeout)?,
        })
    }

    /// API 베이스 URL 변경 (프록시, 테스트 서버)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl AnswerGenerator for GeminiGenerator {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: system }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: user }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
            },
        };

        // API 키는 URL이 아닌 헤더로 전송
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
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
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(GenerationError::InvalidResponse(
                "response has no candidate text".to_string(),
            ));
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(uri: &str) -> GeminiGenerator {
        GeminiGenerator::new("test-key".to_string(), "gemini-2.5-flash", Duration::from_secs(5))
            .unwrap()
            .with_base_url(uri)
    }

    #[tokio::test]
    async fn test_generate_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "systemInstruction": {"parts": [{"text": "SYS"}]},
                "contents": [{"role": "user", "parts": [{"text": "USER"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "裁定："}, {"text": "有效"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(generator(&server.uri()).complete("SYS", "USER").await.unwrap(), "裁定：有效");
    }

    #[tokio::test]
    async fn test_invalid_key_is_authentication() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let err = generator(&server.uri()).complete("s", "u").await.unwrap_err();
        assert!(matches!(err, GenerationError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_rate_limited_is_quota_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = generator(&server.uri()).complete("s", "u").await.unwrap_err();
        assert!(matches!(err, GenerationError::QuotaExhausted(_)));
    }

    #[tokio::test]
    async fn test_empty_candidates_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})))
            .mount(&server)
            .await;

        let err = generator(&server.uri()).complete("s", "u").await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidResponse(_)));
    }
}
