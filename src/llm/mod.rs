//! LLM 모듈 - 검색 결과로 판정 답변 생성
//!
//! 병합된 검색 결과를 `【参考N】` 블록으로 묶어 심판 프롬프트에 넣고,
//! 설정된 백엔드(Ollama / Gemini / OpenAI)로 한 번 호출합니다. 재시도는 없습니다.
//!
//! 백엔드 오류는 경계에서 인증/할당량/네트워크로 분류되어
//! 호출자가 `GenerationError::hint()`로 사용자 안내를 보여줄 수 있습니다.

mod gemini;
mod ollama;
mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{JudgeConfig, LlmBackend};
use crate::knowledge::ResultDoc;

pub use gemini::GeminiGenerator;
pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;

/// 생성 온도 (판정은 결정적일수록 좋음)
pub const TEMPERATURE: f32 = 0.1;

// ============================================================================
// Prompts
// ============================================================================

/// 심판 시스템 프롬프트 (`{context}` 자리에 참고 자료)
pub const SYSTEM_PROMPT: &str = r#"你是一位专业的数码宝贝卡牌游戏（DTCG）裁判。你的职责是根据玩家描述的游戏场面，结合规则和卡牌效果，给出准确的裁定。

【你的工作方式】
1. 仔细分析玩家描述的场面状况
2. 识别涉及的卡牌及其效果
3. 根据规则判断效果的发动条件和处理顺序
4. 给出清晰、有条理的裁定说明

【回答格式要求】
1. 先列出涉及的卡牌及其关键效果
2. 分析效果的发动时机和条件
3. 按照正确的处理顺序说明每一步
4. 如有多种可能的处理方式，分别说明
5. 引用规则时标注来源，如「根据【参考1】...」

【重要规则提醒】
- 效果处理遵循"先发动先处理"原则
- 同时满足发动条件的效果，回合玩家优先选择处理顺序
- 【登场时】【进化时】等时机效果在对应动作完成后发动
- 连锁效果需要按照正确顺序逐一处理

【参考资料】
{context}
"#;

/// 사용자 프롬프트 (`{question}` 자리에 질문)
pub const USER_PROMPT: &str = r#"【玩家提问】
{question}

请作为裁判，分析上述场面并给出裁定。要求：
1. 列出涉及的卡牌效果
2. 说明效果处理顺序
3. 给出最终裁定结果"#;

/// 검색 결과 → `【参考N】` 컨텍스트
pub fn build_context(docs: &[ResultDoc]) -> String {
    docs.iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "【参考{}】\n来源：{}（{}）\n内容：{}\n",
                i + 1,
                doc.title,
                doc.doc_type.label(),
                doc.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 시스템/사용자 프롬프트 채우기
pub fn render_prompts(context: &str, question: &str) -> (String, String) {
    (
        SYSTEM_PROMPT.replace("{context}", context),
        USER_PROMPT.replace("{question}", question),
    )
}

// ============================================================================
// Errors
// ============================================================================

/// 답변 생성 실패 (모두 현재 질문에 치명적, 재시도는 호출자 몫)
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    /// 사용자 안내 문구
    pub fn hint(&self) -> &'static str {
        match self {
            GenerationError::Authentication(_) => {
                "API 키를 확인하세요 (GEMINI_API_KEY / OPENAI_API_KEY)"
            }
            GenerationError::QuotaExhausted(_) => "API 할당량이 소진되었습니다. 잠시 후 다시 시도하세요",
            GenerationError::Network(_) => {
                "네트워크 연결 문제입니다. 서버 주소(OLLAMA_URL 등)나 프록시 설정을 확인하세요"
            }
            GenerationError::Api { .. } => "모델 서버가 오류를 반환했습니다. 모델 이름과 서버 로그를 확인하세요",
            GenerationError::InvalidResponse(_) => "모델 응답을 해석할 수 없습니다",
        }
    }

    /// HTTP 상태 + 응답 메시지로 분류
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        match status {
            401 | 403 => GenerationError::Authentication(message),
            429 => GenerationError::QuotaExhausted(message),
            // Gemini는 잘못된 키를 400 INVALID_ARGUMENT로 돌려줌
            400 if lower.contains("api key") => GenerationError::Authentication(message),
            _ if lower.contains("quota") => GenerationError::QuotaExhausted(message),
            _ => GenerationError::Api { status, message },
        }
    }

    /// 요청 전송 실패 분류
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GenerationError::InvalidResponse(err.to_string())
        } else {
            GenerationError::Network(err.to_string())
        }
    }
}

// ============================================================================
// AnswerGenerator Trait
// ============================================================================

/// 답변 생성기 트레이트
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// 완성된 시스템/사용자 프롬프트로 한 번 호출
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError>;

    /// 모델 이름
    fn name(&self) -> &str;

    /// 검색 결과와 질문으로 답변 생성
    async fn generate(&self, question: &str, docs: &[ResultDoc]) -> Result<String, GenerationError> {
        let context = build_context(docs);
        tracing::info!(
            "Generating answer with {} ({} references, {} chars of context)",
            self.name(),
            docs.len(),
            context.chars().count()
        );

        let (system, user) = render_prompts(&context, question);
        let started = std::time::Instant::now();
        match self.complete(&system, &user).await {
            Ok(answer) => {
                tracing::info!("LLM responded in {:.1}s", started.elapsed().as_secs_f32());
                Ok(answer)
            }
            Err(e) => {
                tracing::warn!(
                    "LLM call failed after {:.1}s: {} ({})",
                    started.elapsed().as_secs_f32(),
                    e,
                    e.hint()
                );
                Err(e)
            }
        }
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 맞는 답변 생성기
pub fn create_generator(config: &JudgeConfig) -> anyhow::Result<Arc<dyn AnswerGenerator>> {
    let generator: Arc<dyn AnswerGenerator> = match config.llm {
        LlmBackend::Ollama => Arc::new(OllamaGenerator::new(
            &config.ollama_url,
            &config.ollama_llm_model,
            config.llm_timeout,
        )?),
        LlmBackend::Gemini => {
            let api_key = config.gemini_api_key.clone().ok_or_else(|| {
                anyhow::anyhow!(
                    "GEMINI_API_KEY or GOOGLE_AI_API_KEY not set.\n\
                     Set: export GEMINI_API_KEY=your-api-key"
                )
            })?;
            Arc::new(GeminiGenerator::new(
                api_key,
                &config.gemini_model,
                config.llm_timeout,
            )?)
        }
        LlmBackend::OpenAi => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
            Arc::new(
                OpenAiGenerator::new(api_key, &config.openai_model, config.llm_timeout)?
                    .with_base_url(&config.openai_url),
            )
        }
    };

    tracing::info!("Using {} for answer generation", generator.name());
    Ok(generator)
}

/// 공통 HTTP 클라이언트 (타임아웃은 설정값)
fn http_client(timeout: std::time::Duration) -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// 에러 응답 본문에서 메시지 추출 (`{"error": {"message"}}` 또는 `{"error": "..."}`)
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            error
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| error.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{DocType, MatchOrigin};

    fn doc(title: &str, doc_type: DocType, content: &str) -> ResultDoc {
        ResultDoc {
            content: content.to_string(),
            content_original: content.to_string(),
            doc_id: "d".to_string(),
            title: title.to_string(),
            doc_type,
            chunk_index: 0,
            source: None,
            score: 0.0,
            origin: MatchOrigin::Semantic,
        }
    }

    #[test]
    fn test_build_context_blocks() {
        let context = build_context(&[
            doc("综合规则", DocType::Rule, "安防检查的处理"),
            doc("BT1", DocType::Card, "【BT1-001】滚球兽"),
        ]);
        assert_eq!(
            context,
            "【参考1】\n来源：综合规则（规则）\n内容：安防检查的处理\n\n\n\
             【参考2】\n来源：BT1（卡牌）\n内容：【BT1-001】滚球兽\n"
        );
    }

    #[test]
    fn test_render_prompts() {
        let (system, user) = render_prompts("CTX", "进化时效果什么时候发动？");
        assert!(system.contains("【参考资料】\nCTX\n"));
        assert!(!system.contains("{context}"));
        assert!(user.starts_with("【玩家提问】\n进化时效果什么时候发动？\n"));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            GenerationError::from_status(401, "unauthorized"),
            GenerationError::Authentication(_)
        ));
        assert!(matches!(
            GenerationError::from_status(403, "forbidden"),
            GenerationError::Authentication(_)
        ));
        assert!(matches!(
            GenerationError::from_status(429, "slow down"),
            GenerationError::QuotaExhausted(_)
        ));
        assert!(matches!(
            GenerationError::from_status(400, "API key not valid. Please pass a valid API key."),
            GenerationError::Authentication(_)
        ));
        assert!(matches!(
            GenerationError::from_status(500, "internal"),
            GenerationError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_hints_are_distinct() {
        let errors = [
            GenerationError::Authentication(String::new()),
            GenerationError::QuotaExhausted(String::new()),
            GenerationError::Network(String::new()),
            GenerationError::Api {
                status: 500,
                message: String::new(),
            },
            GenerationError::InvalidResponse(String::new()),
        ];
        let hints: std::collections::HashSet<_> = errors.iter().map(|e| e.hint()).collect();
        assert_eq!(hints.len(), errors.len());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"error": {"message": "bad key"}}"#), "bad key");
        assert_eq!(error_message(r#"{"error": "model not found"}"#), "model not found");
        assert_eq!(error_message(" plain "), "plain");
    }
}
