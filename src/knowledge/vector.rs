//! Vector Store - 컬렉션 단위 벡터 저장소 트레이트
//!
//! 문서 타입마다 컬렉션이 하나씩 있고, 각 구현체는 컬렉션이 아직 없을 때
//! `StoreError::CollectionMissing`으로 "결과 없음"과 구분해서 알려야 합니다.

use async_trait::async_trait;
use thiserror::Error;

use super::document::{ChunkMetadata, DocType, StoredChunk};

// ============================================================================
// Errors
// ============================================================================

/// 저장소 경계 에러
#[derive(Debug, Error)]
pub enum StoreError {
    /// 컬렉션이 아직 생성되지 않음 (검색 측에서는 빈 결과로 취급)
    #[error("collection not found: {0}")]
    CollectionMissing(String),

    /// 임베딩 차원이 컬렉션과 다름
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 백엔드 I/O 또는 스키마 에러
    #[error("vector store backend error: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_missing(&self) -> bool {
        matches!(self, StoreError::CollectionMissing(_))
    }
}

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 청크 텍스트
    pub text: String,
    /// 청크 메타데이터
    pub metadata: ChunkMetadata,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: StoredChunk,
    /// 거리 (낮을수록 유사, 0 이상)
    pub distance: f32,
}

/// 전체 조회 필터
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkFilter {
    All,
    /// 특정 문서의 청크
    DocId(String),
    /// 본문에 문자열이 그대로 포함된 청크
    Contains(String),
}

impl ChunkFilter {
    pub fn matches(&self, chunk: &StoredChunk) -> bool {
        match self {
            ChunkFilter::All => true,
            ChunkFilter::DocId(id) => chunk.metadata.doc_id == *id,
            ChunkFilter::Contains(needle) => chunk.text.contains(needle.as_str()),
        }
    }
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// - `search`, `scan`: 컬렉션이 없으면 `CollectionMissing`
/// - `delete_by_doc_id`, `count`: 컬렉션이 없으면 0
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 벡터 배치 삽입 (컬렉션이 없으면 생성)
    async fn insert_batch(&self, doc_type: DocType, entries: &[VectorEntry])
        -> Result<usize, StoreError>;

    /// 최근접 검색 (거리 오름차순)
    async fn search(
        &self,
        doc_type: DocType,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, StoreError>;

    /// 필터에 맞는 청크 전체 조회
    async fn scan(&self, doc_type: DocType, filter: &ChunkFilter)
        -> Result<Vec<StoredChunk>, StoreError>;

    /// doc_id의 청크 전부 삭제, 삭제된 개수 반환
    async fn delete_by_doc_id(&self, doc_type: DocType, doc_id: &str) -> Result<usize, StoreError>;

    /// 컬렉션의 청크 개수
    async fn count(&self, doc_type: DocType) -> Result<usize, StoreError>;

    /// 컬렉션 존재 여부
    async fn has_collection(&self, doc_type: DocType) -> Result<bool, StoreError>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 제곱 L2 거리 (LanceDB 기본 거리와 같은 척도)
pub fn squared_l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// 엔트리들의 임베딩 차원이 모두 같은지 확인하고 그 차원을 반환
pub(crate) fn uniform_dimension(entries: &[VectorEntry]) -> Result<usize, StoreError> {
    let expected = entries.first().map(|e| e.embedding.len()).unwrap_or(0);
    for entry in entries {
        if entry.embedding.len() != expected {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: entry.embedding.len(),
            });
        }
    }
    Ok(expected)
}

// ============================================================================
// Tests
// ============================================================================
