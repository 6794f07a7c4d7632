//! OpenAI 호환 Chat Completions (`POST {base}/v1/chat/completions`)

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{error_message, http_client, AnswerGenerator, GenerationError, TEMPERATURE};
use crate::config::DEFAULT_OPENAI_URL;

#[derive(Debug)]
pub struct OpenAiGenerator {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key,
            model: model.to_string(),
            base_url: DEFAULT_OPENAI_URL.to_string(),
            client: http_client(timeout)?,
        })
    }

    /// 호환 서버 주소 (`/v1` 앞부분까지)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("response has no choices".to_string()))
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

    fn generator(uri: &str) -> OpenAiGenerator {
        OpenAiGenerator::new("sk-test".to_string(), "gpt-4o-mini", Duration::from_secs(5))
            .unwrap()
            .with_base_url(uri)
    }

    #[tokio::test]
    async fn test_chat_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "system", "content": "SYS"}, {"role": "user", "content": "USER"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "裁定完成"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(generator(&server.uri()).complete("SYS", "USER").await.unwrap(), "裁定完成");
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let err = generator(&server.uri()).complete("s", "u").await.unwrap_err();
        assert!(matches!(err, GenerationError::Authentication(ref m) if m.contains("Incorrect API key")));
    }

    #[tokio::test]
    async fn test_insufficient_quota() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "You exceeded your current quota", "type": "insufficient_quota"}
            })))
            .mount(&server)
            .await;

        let err = generator(&server.uri()).complete("s", "u").await.unwrap_err();
        assert!(matches!(err, GenerationError::QuotaExhausted(_)));
    }
}
