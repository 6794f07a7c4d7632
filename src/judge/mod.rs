//! 판정 서비스 - 질문 한 건의 전체 흐름
//!
//! 질문 분석 → 카드 번호 정확 매칭 → 용어 확장 의미 검색 → 병합 → 답변 생성.
//! 검색 엔진과 답변 생성기는 생성 시 주입되고, 요청 간에 공유됩니다.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::knowledge::{
    has_card_marker, DocType, MatchOrigin, ResultDoc, ResultMerger, RetrievalEngine,
    RetrievalError, SearchOptions,
};
use crate::llm::{AnswerGenerator, GenerationError};
use crate::query::{QueryEntity, QueryProcessor};

/// 검색 결과가 없을 때 답변 (생성기를 호출하지 않음)
pub const NO_CONTEXT_ANSWER: &str =
    "抱歉，我在知识库中没有找到与您问题相关的信息。请确保已上传相关规则文档。";

/// 출처 발췌 최대 길이 (문자 수)
pub const EXCERPT_CHARS: usize = 500;

// ============================================================================
// Types
// ============================================================================

/// 판정 실패
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// 답변에 쓰인 출처
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub title: String,
    pub doc_type: DocType,
    pub excerpt: String,
}

/// 직접 표시용 카드 정보
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardHit {
    pub card_no: String,
    pub title: String,
    pub content: String,
}

/// 질문 응답
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub cards: Vec<CardHit>,
}

/// 답변 생성 전 검색 결과
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub entity: QueryEntity,
    /// 병합된 결과 (정확 매칭 먼저)
    pub docs: Vec<ResultDoc>,
    /// 조회한 카드 번호 (중복 제거, 등장 순)
    pub card_numbers: Vec<String>,
}

impl Retrieval {
    pub fn sources(&self) -> Vec<SourceRef> {
        self.docs
            .iter()
            .map(|doc| SourceRef {
                title: doc.title.clone(),
                doc_type: doc.doc_type,
                excerpt: excerpt(&doc.content, EXCERPT_CHARS),
            })
            .collect()
    }

    /// 카드 타입 정확 매칭 결과
    pub fn cards(&self) -> Vec<CardHit> {
        self.docs
            .iter()
            .filter(|doc| doc.origin == MatchOrigin::Exact && doc.doc_type == DocType::Card)
            .filter_map(|doc| {
                let card_no = self
                    .card_numbers
                    .iter()
                    .find(|no| has_card_marker(&doc.content_original, no))?;
                Some(CardHit {
                    card_no: card_no.clone(),
                    title: doc.title.clone(),
                    content: doc.content.clone(),
                })
            })
            .collect()
    }
}

// ============================================================================
// JudgeService
// ============================================================================

pub struct JudgeService {
    engine: Arc<RetrievalEngine>,
    generator: Arc<dyn AnswerGenerator>,
    top_k: usize,
}

impl JudgeService {
    pub fn new(
        engine: Arc<RetrievalEngine>,
        generator: Arc<dyn AnswerGenerator>,
        top_k: usize,
    ) -> Self {
        Self {
            engine,
            generator,
            top_k,
        }
    }

    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }

    /// 검색 + 병합 (답변 생성 없음)
    pub async fn retrieve(
        &self,
        question: &str,
        doc_types: &[DocType],
        top_k: Option<usize>,
    ) -> Result<Retrieval, JudgeError> {
        let top_k = top_k.unwrap_or(self.top_k);
        Ok(retrieve(&self.engine, question, doc_types, top_k).await?)
    }

    /// 질문에 답변
    pub async fn query(
        &self,
        question: &str,
        doc_types: &[DocType],
        top_k: Option<usize>,
    ) -> Result<QueryResponse, JudgeError> {
        let retrieval = self.retrieve(question, doc_types, top_k).await?;

        if retrieval.docs.is_empty() {
            tracing::info!("No references found, skipping answer generation");
            return Ok(QueryResponse {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: vec![],
                cards: vec![],
            });
        }

        let answer = self.generator.generate(question, &retrieval.docs).await?;
        Ok(QueryResponse {
            answer,
            sources: retrieval.sources(),
            cards: retrieval.cards(),
        })
    }
}

/// 질문 분석 → 카드 번호 정확 매칭 → 의미 검색 → 병합
///
/// 의미 검색이 실패해도 정확 매칭 결과가 있으면 그것만으로 진행합니다.
pub async fn retrieve(
    engine: &RetrievalEngine,
    question: &str,
    doc_types: &[DocType],
    top_k: usize,
) -> Result<Retrieval, RetrievalError> {
    if question.trim().is_empty() {
        return Err(RetrievalError::EmptyQuery);
    }

    let entity = QueryProcessor::new().analyze(question);
    let mut card_numbers: Vec<String> = Vec::with_capacity(entity.card_numbers.len());
    for no in &entity.card_numbers {
        if !card_numbers.contains(no) {
            card_numbers.push(no.clone());
        }
    }
    if !card_numbers.is_empty() {
        tracing::info!("Card numbers in question: {:?}", card_numbers);
    }

    let mut exact = Vec::new();
    for no in &card_numbers {
        let hits = engine.search_by_card_number(no, true).await;
        tracing::debug!("{}: {} exact hits", no, hits.len());
        exact.extend(hits);
    }

    let semantic = match engine
        .search(question, doc_types, top_k, SearchOptions::default())
        .await
    {
        Ok(hits) => hits,
        Err(e) if !exact.is_empty() => {
            tracing::warn!("Semantic search failed, using exact matches only: {}", e);
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    let docs = ResultMerger::new(top_k).merge(exact, semantic, card_numbers.len());
    tracing::info!("Retrieved {} references", docs.len());

    Ok(Retrieval {
        entity,
        docs,
        card_numbers,
    })
}

/// 앞부분 `max_chars`자, 더 길면 `...` 추가
pub fn excerpt(content: &str, max_chars: usize) -> String {
    if content.chars().count() > max_chars {
        let head: String = content.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        content.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
