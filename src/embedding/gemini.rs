//! Gemini 임베딩 프로바이더
//!
//! source: https://ai.google.dev/gemini-api/docs/embeddings
//!
//! 문서는 `RETRIEVAL_DOCUMENT`, 질문은 `RETRIEVAL_QUERY` 태스크 타입으로 임베딩합니다.
//! 호출은 rate limiter 뮤텍스를 통해 직렬화됩니다.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::EmbeddingProvider;

/// Gemini API 베이스 URL
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// 임베딩 모델 (MRL 지원 - 차원 축소 가능)
const GEMINI_EMBED_MODEL: &str = "gemini-embedding-001";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// Rate Limiter 설정 (Gemini 무료 티어: 60 RPM)
const RATE_LIMIT_RPM: usize = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이
const MIN_DELAY_MS: u64 = 1000;
/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;

/// 임베딩 용도
#[derive(Debug, Clone, Copy)]
enum TaskType {
    Document,
    Query,
}

impl TaskType {
    fn as_str(&self) -> &'static str {
        match self {
            TaskType::Document => "RETRIEVAL_DOCUMENT",
            TaskType::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    dimension: usize,
    pacer: Arc<Mutex<RequestPacer>>,
}

/// 분당 요청 수 + 최소 간격 제한 (슬라이딩 윈도우)
#[derive(Debug)]
struct RequestPacer {
    sent: VecDeque<Instant>,
    max_requests: usize,
    window: Duration,
    min_gap: Duration,
}

impl RequestPacer {
    fn new(max_requests: usize, window: Duration, min_gap: Duration) -> Self {
        Self {
            sent: VecDeque::new(),
            max_requests,
            window,
            min_gap,
        }
    }

    fn unlimited() -> Self {
        Self::new(usize::MAX, RATE_LIMIT_WINDOW, Duration::ZERO)
    }

    /// 다음 요청까지 기다려야 하는 시간
    fn delay_at(&mut self, now: Instant) -> Duration {
        while let Some(&first) = self.sent.front() {
            if now.duration_since(first) >= self.window {
                self.sent.pop_front();
            } else {
                break;
            }
        }

        let gap = self
            .sent
            .back()
            .map(|&last| self.min_gap.saturating_sub(now.duration_since(last)))
            .unwrap_or_default();

        let window = if self.sent.len() >= self.max_requests {
            self.sent
                .front()
                .map(|&first| self.window.saturating_sub(now.duration_since(first)))
                .unwrap_or_default()
        } else {
            Duration::ZERO
        };

        gap.max(window)
    }

    async fn wait_turn(&mut self) {
        let delay = self.delay_at(Instant::now());
        if !delay.is_zero() {
            tracing::debug!("Pacing Gemini request, waiting {:?}", delay);
            tokio::time::sleep(delay).await;
        }
        self.sent.push_back(Instant::now());
    }
}

/// 요청 1회 결과
enum Attempt {
    Done(Vec<f32>),
    /// 429 / 전송 실패 - 백오프 후 재시도
    Retry(anyhow::Error),
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS << attempt)
}

impl GeminiEmbedding {
    /// 새 Gemini 임베딩 인스턴스 생성
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_dimension(api_key, DEFAULT_DIMENSION)
    }

    /// 차원 지정 (768, 1536, 3072)
    pub fn with_dimension(api_key: String, dimension: usize) -> Result<Self> {
        if ![768, 1536, 3072].contains(&dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            client,
            dimension,
            pacer: Arc::new(Mutex::new(RequestPacer::new(
                RATE_LIMIT_RPM,
                RATE_LIMIT_WINDOW,
                Duration::from_millis(MIN_DELAY_MS),
            ))),
        })
    }

    /// API 베이스 URL 변경 (프록시, 테스트 서버)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[cfg(test)]
    fn without_rate_limit(self) -> Self {
        *self.pacer.try_lock().expect("fresh pacer") = RequestPacer::unlimited();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:embedContent",
            self.base_url, GEMINI_EMBED_MODEL
        )
    }

    async fn embed_with_task(&self, text: &str, task: TaskType) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let request = EmbedRequest {
            model: format!("models/{}", GEMINI_EMBED_MODEL),
            content: EmbedContent {
                parts: vec![EmbedPart { text }],
            },
            task_type: task.as_str(),
            output_dimensionality: Some(self.dimension),
        };

        let mut attempt = 0;
        loop {
            self.pacer.lock().await.wait_turn().await;

            match self.send(&request).await? {
                Attempt::Done(values) => return Ok(values),
                Attempt::Retry(e) if attempt < MAX_RETRIES => {
                    let wait = backoff(attempt);
                    attempt += 1;
                    tracing::warn!("{}, retrying in {:?} ({}/{})", e, wait, attempt, MAX_RETRIES);
                    tokio::time::sleep(wait).await;
                }
                Attempt::Retry(e) => {
                    return Err(e.context(format!("Embedding failed after {} retries", MAX_RETRIES)))
                }
            }
        }
    }

    /// 요청 1회 전송. 429가 아닌 API 에러는 즉시 실패
    async fn send(&self, request: &EmbedRequest<'_>) -> Result<Attempt> {
        // API 키는 URL이 아닌 헤더로 전송
        let response = match self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return Ok(Attempt::Retry(anyhow::anyhow!("Embedding request failed: {}", e))),
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if status.is_success() {
            let parsed: EmbedResponse =
                serde_json::from_str(&body).context("Failed to parse embedding response")?;
            return Ok(Attempt::Done(parsed.embedding.values));
        }
        if status.as_u16() == 429 {
            return Ok(Attempt::Retry(anyhow::anyhow!("Rate limit exceeded (429)")));
        }

        match serde_json::from_str::<GeminiError>(&body) {
            Ok(error) => anyhow::bail!(
                "Gemini API error ({}): {}",
                error.error.status,
                error.error.message
            ),
            Err(_) => anyhow::bail!("Gemini API error ({}): {}", status, body),
        }
    }
}

/// Gemini API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: EmbedContent<'a>,
    #[serde(rename = "taskType")]
    task_type: &'static str,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(text, TaskType::Document).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(text, TaskType::Query).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Gemini는 배치 API가 없으므로 순차 처리 (rate limiter가 조절)
        let mut results = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding batch {}/{}", i + 1, texts.len());
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        GEMINI_EMBED_MODEL
    }
}

// ============================================================================
// Tests
// ============================================================================
