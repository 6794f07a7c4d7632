//! Knowledge 모듈 - 문서 타입별 벡터 컬렉션 지식 저장소
//!
//! - Document: 문서 타입(규칙/裁定/判例/카드), 메타데이터, 검색 결과 타입
//! - Chunker: 구분자 우선순위 기반 재귀 분할
//! - VectorStore: 컬렉션 추상화 (LanceDB / 메모리)
//! - Engine: 수집, 카드 번호 정확 매칭, 의미 검색, 관리
//! - Merge: 정확 매칭 우선 결과 병합

mod chunker;
mod document;
mod engine;
mod lance;
mod memory;
mod merge;
mod vector;

// Re-exports
pub use chunker::{default_chunker, ChunkConfig, Chunker, RecursiveChunker, DEFAULT_SEPARATORS};
pub use document::{
    generate_doc_id, join_tags, split_tags, ChunkMetadata, DocType, DocumentMetadata,
    DocumentSummary, IngestReport, MatchOrigin, ResultDoc, StoredChunk,
};
pub use engine::{
    has_card_marker, CollectionStats, IngestError, RetrievalEngine, RetrievalError,
    SearchOptions, CARD_MATCH_CAP,
};
pub use lance::LanceVectorStore;
pub use memory::MemoryVectorStore;
pub use merge::{content_fingerprint, ResultMerger, FINGERPRINT_PREFIX_CHARS};
pub use vector::{
    squared_l2_distance, ChunkFilter, SearchResult, StoreError, VectorEntry, VectorStore,
};
