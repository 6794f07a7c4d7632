//! dtcg-judge - DTCG 카드게임 룰 판정 RAG
//!
//! 중국어 질문을 용어집으로 일본어 공식 용어로 변환한 뒤,
//! 카드 번호 정확 매칭 + LanceDB 벡터 검색 결과를 병합해
//! LLM 판정 답변을 생성합니다.

pub mod cards;
pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod extractor;
pub mod judge;
pub mod knowledge;
pub mod llm;
pub mod query;
pub mod terminology;

// Re-exports
pub use cards::{CardCorpus, CardRecord};
pub use config::{JudgeConfig, LlmBackend, EmbeddingBackend};
pub use embedding::{EmbeddingProvider, LazyEmbedder, create_embedder};
pub use judge::{JudgeError, JudgeService, QueryResponse, Retrieval};
pub use knowledge::{
    DocType, DocumentMetadata, LanceVectorStore, MemoryVectorStore, ResultDoc, RetrievalEngine,
    SearchOptions, VectorStore,
};
pub use llm::{AnswerGenerator, GenerationError, create_generator};
pub use query::{QueryEntity, QueryProcessor};
pub use terminology::{TerminologyEntry, TerminologyTranslator};
