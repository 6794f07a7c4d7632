//! RetrievalEngine - 문서 타입별 컬렉션 수집/검색
//!
//! - 수집: 재귀 청킹 → 공유 임베딩 → 컬렉션 저장
//! - 정확 매칭: `【카드번호】` / `【카드번호_` 마커 검색 (카드 코퍼스 → 카드 컬렉션 → 룰 컬렉션)
//! - 의미 검색: 컬렉션을 순서대로 검색해 거리 오름차순으로 합침
//!
//! 컬렉션이 없거나 한 컬렉션이 실패해도 나머지 컬렉션 검색은 계속합니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::cards::{CardCorpus, CardRecord};
use crate::embedding::LazyEmbedder;
use crate::query::canonicalize_card_number;
use crate::terminology::TerminologyTranslator;

use super::chunker::{default_chunker, Chunker};
use super::document::{
    generate_doc_id, ChunkMetadata, DocType, DocumentMetadata, DocumentSummary, IngestReport,
    MatchOrigin, ResultDoc, StoredChunk,
};
use super::vector::{ChunkFilter, StoreError, VectorEntry, VectorStore};

/// 카드 번호 정확 매칭 최대 결과 수 (이화 버전 대응)
pub const CARD_MATCH_CAP: usize = 3;

/// 정확 매칭 폴백 검색 순서
const CARD_FALLBACK_ORDER: [DocType; 4] =
    [DocType::Card, DocType::Rule, DocType::Ruling, DocType::Case];

// ============================================================================
// Errors
// ============================================================================

/// 수집 실패 (부분 저장 없이 거부)
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("document has no text content: {0}")]
    EmptyContent(String),

    #[error("failed to read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 검색 실패
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// 빈 질문 ("결과 없음"과 구분)
    #[error("query is empty")]
    EmptyQuery,

    #[error("query embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 검색 옵션
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// 임베딩 전에 용어 확장
    pub translate_query: bool,
    /// 결과 본문 역번역 (원문은 `content_original`에 유지)
    pub translate_result: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            translate_query: true,
            translate_result: true,
        }
    }
}

/// 컬렉션 통계
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub doc_type: DocType,
    pub exists: bool,
    pub chunk_count: usize,
}

// ============================================================================
// RetrievalEngine
// ============================================================================

/// 검색 엔진 (서비스 객체 - 공유 상태를 명시적으로 소유)
pub struct RetrievalEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<LazyEmbedder>,
    translator: Arc<TerminologyTranslator>,
    cards: Arc<CardCorpus>,
    chunker: Box<dyn Chunker>,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<LazyEmbedder>,
        translator: Arc<TerminologyTranslator>,
        cards: Arc<CardCorpus>,
    ) -> Self {
        Self {
            store,
            embedder,
            translator,
            cards,
            chunker: default_chunker(),
        }
    }

    /// 청커 교체
    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn translator(&self) -> &TerminologyTranslator {
        &self.translator
    }

    pub fn cards(&self) -> &CardCorpus {
        &self.cards
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// 문서 추가 (같은 doc_id가 이미 있어도 청크를 덧붙임)
    pub async fn add_document(
        &self,
        content: &str,
        metadata: DocumentMetadata,
    ) -> Result<IngestReport, IngestError> {
        if content.trim().is_empty() {
            return Err(IngestError::EmptyContent(metadata.title));
        }

        let doc_id = generate_doc_id(&metadata.title, content);
        let chunks = self.chunker.chunk(content);
        if chunks.is_empty() {
            return Err(IngestError::EmptyContent(metadata.title));
        }

        let embedder = self.embedder.get().await.map_err(IngestError::Embedding)?;
        let embeddings = embedder
            .embed_batch(&chunks)
            .await
            .map_err(IngestError::Embedding)?;

        let created_at = Utc::now();
        let entries: Vec<VectorEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| VectorEntry {
                text,
                metadata: ChunkMetadata {
                    doc_id: doc_id.clone(),
                    title: metadata.title.clone(),
                    doc_type: metadata.doc_type,
                    version: metadata.version.clone(),
                    effective_date: metadata.effective_date.clone(),
                    source: metadata.source.clone(),
                    tags: metadata.tags.clone(),
                    chunk_index: i as i32,
                    created_at,
                },
                embedding,
            })
            .collect();

        let chunk_count = self.store.insert_batch(metadata.doc_type, &entries).await?;
        tracing::info!(
            "Ingested '{}' into {} ({} chunks, doc_id={})",
            metadata.title,
            metadata.doc_type.collection_name(),
            chunk_count,
            doc_id
        );

        Ok(IngestReport {
            doc_id,
            title: metadata.title,
            doc_type: metadata.doc_type,
            chunk_count,
        })
    }

    /// 문서 교체 (같은 doc_id의 기존 청크를 지운 뒤 추가)
    pub async fn upsert_document(
        &self,
        content: &str,
        metadata: DocumentMetadata,
    ) -> Result<IngestReport, IngestError> {
        if content.trim().is_empty() {
            return Err(IngestError::EmptyContent(metadata.title));
        }

        let doc_id = generate_doc_id(&metadata.title, content);
        let removed = self.store.delete_by_doc_id(metadata.doc_type, &doc_id).await?;
        if removed > 0 {
            tracing::info!("Replacing {} existing chunks of {}", removed, doc_id);
        }
        self.add_document(content, metadata).await
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// 의미 검색
    ///
    /// `doc_types`가 비어 있으면 전체 컬렉션. 결과는 거리 오름차순, 최대 `top_k`개.
    pub async fn search(
        &self,
        query: &str,
        doc_types: &[DocType],
        top_k: usize,
        options: SearchOptions,
    ) -> Result<Vec<ResultDoc>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let search_text = if options.translate_query {
            self.translator.expand_query(query)
        } else {
            query.to_string()
        };
        tracing::debug!("Semantic search text: {}", search_text);

        let embedder = self.embedder.get().await.map_err(RetrievalError::Embedding)?;
        let embedding = embedder
            .embed_query(&search_text)
            .await
            .map_err(RetrievalError::Embedding)?;

        let types: &[DocType] = if doc_types.is_empty() {
            &DocType::ALL
        } else {
            doc_types
        };

        let mut results = Vec::new();
        for &doc_type in types {
            match self.store.search(doc_type, &embedding, top_k).await {
                Ok(hits) => {
                    tracing::debug!("{}: {} hits", doc_type.collection_name(), hits.len());
                    results.extend(hits.into_iter().map(|hit| {
                        ResultDoc::from_chunk(hit.chunk, hit.distance, MatchOrigin::Semantic)
                    }));
                }
                Err(StoreError::CollectionMissing(name)) => {
                    tracing::debug!("Collection {} not created yet, skipping", name);
                }
                Err(e) => {
                    tracing::warn!("Search failed on {}: {}", doc_type.collection_name(), e);
                }
            }
        }

        results.sort_by(|a, b| a.score.total_cmp(&b.score));
        results.truncate(top_k);

        if options.translate_result {
            self.back_translate(&mut results);
        }
        Ok(results)
    }

    /// 카드 번호 정확 매칭
    ///
    /// 카드 코퍼스에 있으면 그 결과만, 없으면 컬렉션에서 마커를 찾습니다.
    /// 점수는 항상 0.0, 최대 `CARD_MATCH_CAP`개.
    pub async fn search_by_card_number(&self, card_no: &str, translate_result: bool) -> Vec<ResultDoc> {
        let canonical = canonicalize_card_number(card_no)
            .unwrap_or_else(|| card_no.trim().to_ascii_uppercase());
        if canonical.is_empty() {
            return vec![];
        }

        let mut results: Vec<ResultDoc> = self
            .cards
            .lookup(&canonical)
            .iter()
            .take(CARD_MATCH_CAP)
            .map(card_result)
            .collect();

        if results.is_empty() {
            results = self.scan_card_marker(&canonical).await;
        }
        tracing::debug!("Exact match {}: {} results", canonical, results.len());

        if translate_result {
            self.back_translate(&mut results);
        }
        results
    }

    /// 컬렉션에서 `【X】` / `【X_` 마커가 있는 청크 찾기
    async fn scan_card_marker(&self, canonical: &str) -> Vec<ResultDoc> {
        // 세트 코드까지만 DB에서 거르고 번호는 정규화해서 비교 (`【BT01-001】` == `BT1-001`)
        let code: String = canonical
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        let needle = format!("【{}", code);
        let mut results = Vec::new();

        for doc_type in CARD_FALLBACK_ORDER {
            if results.len() >= CARD_MATCH_CAP {
                break;
            }

            let chunks = match self
                .store
                .scan(doc_type, &ChunkFilter::Contains(needle.clone()))
                .await
            {
                Ok(chunks) => chunks,
                Err(StoreError::CollectionMissing(_)) => continue,
                Err(e) => {
                    tracing::warn!("Card scan failed on {}: {}", doc_type.collection_name(), e);
                    continue;
                }
            };

            let remaining = CARD_MATCH_CAP - results.len();
            results.extend(
                chunks
                    .into_iter()
                    .filter(|chunk| has_card_marker(&chunk.text, canonical))
                    .take(remaining)
                    .map(|chunk| ResultDoc::from_chunk(chunk, 0.0, MatchOrigin::Exact)),
            );
        }

        results
    }

    fn back_translate(&self, results: &mut [ResultDoc]) {
        for doc in results {
            doc.content = self.translator.translate_result(&doc.content_original);
        }
    }

    // ========================================================================
    // Management
    // ========================================================================

    /// 문서 삭제 (삭제된 청크가 있으면 true, 실패는 로그 후 false)
    pub async fn delete_document(&self, doc_id: &str, doc_type: DocType) -> bool {
        match self.store.delete_by_doc_id(doc_type, doc_id).await {
            Ok(0) => {
                tracing::info!("No chunks for {} in {}", doc_id, doc_type.collection_name());
                false
            }
            Ok(n) => {
                tracing::info!("Deleted {} ({} chunks)", doc_id, n);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to delete {}: {}", doc_id, e);
                false
            }
        }
    }

    /// 문서 목록 (청크 메타데이터를 doc_id별로 집계)
    pub async fn list_documents(
        &self,
        doc_type: Option<DocType>,
    ) -> Result<Vec<DocumentSummary>, StoreError> {
        let types: Vec<DocType> = match doc_type {
            Some(t) => vec![t],
            None => DocType::ALL.to_vec(),
        };

        let mut summaries = Vec::new();
        for doc_type in types {
            let chunks = match self.store.scan(doc_type, &ChunkFilter::All).await {
                Ok(chunks) => chunks,
                Err(StoreError::CollectionMissing(_)) => continue,
                Err(e) => return Err(e),
            };

            let mut by_doc: BTreeMap<String, DocumentSummary> = BTreeMap::new();
            for chunk in chunks {
                let meta = chunk.metadata;
                by_doc
                    .entry(meta.doc_id.clone())
                    .and_modify(|s| {
                        s.chunk_count += 1;
                        if meta.created_at < s.created_at {
                            s.created_at = meta.created_at;
                        }
                    })
                    .or_insert_with(|| DocumentSummary {
                        doc_id: meta.doc_id.clone(),
                        title: meta.title.clone(),
                        doc_type: meta.doc_type,
                        chunk_count: 1,
                        tags: meta.tags.clone(),
                        created_at: meta.created_at,
                    });
            }

            let mut docs: Vec<DocumentSummary> = by_doc.into_values().collect();
            docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.title.cmp(&b.title)));
            summaries.extend(docs);
        }

        Ok(summaries)
    }

    /// 문서의 청크 전부 (chunk_index 순)
    pub async fn get_document_chunks(&self, doc_id: &str) -> Result<Vec<StoredChunk>, StoreError> {
        let mut chunks = Vec::new();
        for doc_type in DocType::ALL {
            match self
                .store
                .scan(doc_type, &ChunkFilter::DocId(doc_id.to_string()))
                .await
            {
                Ok(found) => chunks.extend(found),
                Err(StoreError::CollectionMissing(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        chunks.sort_by_key(|c| (c.metadata.doc_type, c.metadata.chunk_index));
        Ok(chunks)
    }

    /// 컬렉션별 청크 수
    pub async fn stats(&self) -> Result<Vec<CollectionStats>, StoreError> {
        let mut stats = Vec::with_capacity(DocType::ALL.len());
        for doc_type in DocType::ALL {
            stats.push(CollectionStats {
                doc_type,
                exists: self.store.has_collection(doc_type).await?,
                chunk_count: self.store.count(doc_type).await?,
            });
        }
        Ok(stats)
    }
}

/// 카드 코퍼스 레코드 → 결과 문서
fn card_result(card: &CardRecord) -> ResultDoc {
    let text = card.to_text();
    ResultDoc {
        content: text.clone(),
        content_original: text,
        doc_id: format!("card:{}", card.card_no),
        title: card.title(),
        doc_type: DocType::Card,
        chunk_index: 0,
        source: card.pack_name.clone(),
        score: 0.0,
        origin: MatchOrigin::Exact,
    }
}

/// 마커 안에 들어갈 수 있는 카드 번호 최대 길이
const MAX_MARKER_TOKEN: usize = 16;

/// `【X】` 또는 `【X_` (이화 접미사) 포함 여부
///
/// 마커 안의 번호는 정규화해서 비교하므로 `【BT01-001】`도 `BT1-001`에 매칭됩니다.
pub fn has_card_marker(text: &str, canonical: &str) -> bool {
    text.split('【').skip(1).any(|rest| {
        let Some(end) = rest.find(['】', '_']) else {
            return false;
        };
        let token = &rest[..end];
        if token.is_empty() || token.len() > MAX_MARKER_TOKEN {
            return false;
        }
        token == canonical || canonicalize_card_number(token).as_deref() == Some(canonical)
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedding;
    use crate::knowledge::chunker::{ChunkConfig, RecursiveChunker};
    use crate::knowledge::memory::MemoryVectorStore;
    use crate::terminology::TerminologyEntry;

    fn engine_with(cards: CardCorpus, translator: TerminologyTranslator) -> RetrievalEngine {
        RetrievalEngine::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(LazyEmbedder::ready(Arc::new(HashEmbedding::default()))),
            Arc::new(translator),
            Arc::new(cards),
        )
    }

    fn engine() -> RetrievalEngine {
        engine_with(CardCorpus::empty(), TerminologyTranslator::empty())
    }

    #[test]
    fn test_card_marker_bounds() {
        assert!(has_card_marker("【BT1-001】亚古兽", "BT1-001"));
        assert!(has_card_marker("【BT1-001_P1】亚古兽", "BT1-001"));
        assert!(!has_card_marker("【BT1-0011】", "BT1-001"));
        assert!(!has_card_marker("BT1-001 没有括号", "BT1-001"));
        assert!(has_card_marker("【BT01-001】滚球兽", "BT1-001"));
        assert!(has_card_marker("前文【进化时】后文【bt01-001_P2】", "BT1-001"));
        assert!(!has_card_marker("【BT01-002】", "BT1-001"));
        assert!(!has_card_marker("【BT1-001 没有结尾", "BT1-001"));
    }

    #[tokio::test]
    async fn test_zero_padded_card_numbers_round_trip() {
        let engine = engine();
        let text = crate::extractor::json_to_text(r#"[{"card_no": "BT01-001", "card_name": "滚球兽"}]"#);
        assert!(text.starts_with("【BT1-001】滚球兽"));
        engine
            .add_document(&text, DocumentMetadata::new(DocType::Card, "BT01"))
            .await
            .unwrap();

        for spelling in ["BT01-001", "BT1001", "bt1-001"] {
            let hits = engine.search_by_card_number(spelling, false).await;
            assert_eq!(hits.len(), 1, "lookup by {}", spelling);
            assert_eq!(hits[0].doc_type, DocType::Card);
        }

        // 규칙 문서에 원문 그대로 적힌 번호도 매칭
        engine
            .add_document("关于【BT01-002】的裁定：不能进化。", DocumentMetadata::new(DocType::Ruling, "Q&A"))
            .await
            .unwrap();
        let hits = engine.search_by_card_number("BT1-002", false).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_type, DocType::Ruling);
    }

    #[tokio::test]
    async fn test_add_and_list_documents() {
        let engine = engine();
        let report = engine
            .add_document(
                "6.1 进化\n\n支付进化费用，将数码宝贝卡重叠到场上的数码宝贝上。",
                DocumentMetadata::new(DocType::Rule, "综合规则").with_tags(["进化"]),
            )
            .await
            .unwrap();
        assert_eq!(report.chunk_count, 1);
        assert_eq!(report.doc_id.len(), 12);

        let docs = engine.list_documents(None).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "综合规则");
        assert_eq!(docs[0].tags, vec!["进化"]);
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let engine = engine();
        let err = engine
            .add_document("  \n ", DocumentMetadata::new(DocType::Rule, "空"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::EmptyContent(_)));
        assert!(engine.list_documents(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reingest_appends_and_upsert_replaces() {
        let engine = engine();
        let content = "Q: 安防效果能否在对手回合发动？\nA: 可以。";
        let meta = DocumentMetadata::new(DocType::Ruling, "裁定集");

        let first = engine.add_document(content, meta.clone()).await.unwrap();
        let second = engine.add_document(content, meta.clone()).await.unwrap();
        assert_eq!(first.doc_id, second.doc_id);

        let docs = engine.list_documents(Some(DocType::Ruling)).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].chunk_count, 2 * first.chunk_count);

        engine.upsert_document(content, meta).await.unwrap();
        let docs = engine.list_documents(Some(DocType::Ruling)).await.unwrap();
        assert_eq!(docs[0].chunk_count, first.chunk_count);
    }

    #[tokio::test]
    async fn test_search_orders_and_skips_missing_collections() {
        let engine = engine();
        engine
            .add_document("安防效果在安防检查时发动。", DocumentMetadata::new(DocType::Rule, "安防"))
            .await
            .unwrap();
        engine
            .add_document("卡组由五十张卡牌构成。", DocumentMetadata::new(DocType::Case, "卡组"))
            .await
            .unwrap();

        // ruling / card 컬렉션은 없음
        let results = engine
            .search("安防效果什么时候发动", &[], 5, SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "安防");
        assert!(results.windows(2).all(|w| w[0].score <= w[1].score));

        let limited = engine
            .search("安防", &[DocType::Ruling], 5, SearchOptions::default())
            .await
            .unwrap();
        assert!(limited.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_is_an_error() {
        let engine = engine();
        let err = engine
            .search("   ", &[], 5, SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_back_translation_keeps_original() {
        let translator = TerminologyTranslator::from_entries([TerminologyEntry {
            source_term: "安防".to_string(),
            target_term: "セキュリティ".to_string(),
            category: "general".to_string(),
        }]);
        let engine = engine_with(CardCorpus::empty(), translator);
        engine
            .add_document("セキュリティの効果を処理する", DocumentMetadata::new(DocType::Rule, "JP"))
            .await
            .unwrap();

        let results = engine
            .search("安防检查", &[DocType::Rule], 3, SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(results[0].content, "安防の効果を処理する");
        assert_eq!(results[0].content_original, "セキュリティの効果を処理する");
    }

    #[tokio::test]
    async fn test_card_lookup_prefers_corpus_then_collections() {
        let cards = CardCorpus::from_json_str(
            r#"[{"card_no": "BT1-010", "card_name": "暴龙兽"}]"#,
        )
        .unwrap();
        let engine = engine_with(cards, TerminologyTranslator::empty());
        engine
            .add_document(
                "【BT1-001】亚古兽\n效果: 无\n\n---\n\n【BT1-001_P1】亚古兽\n效果: 无\n\n---\n\n【BT1-0015】别的卡",
                DocumentMetadata::new(DocType::Card, "BT1"),
            )
            .await
            .unwrap();
        engine
            .add_document("关于【BT1-001】的裁定：可以进化。", DocumentMetadata::new(DocType::Ruling, "Q&A"))
            .await
            .unwrap();

        let from_corpus = engine.search_by_card_number("bt1010", true).await;
        assert_eq!(from_corpus.len(), 1);
        assert_eq!(from_corpus[0].doc_id, "card:BT1-010");
        assert_eq!(from_corpus[0].score, 0.0);

        let fallback = engine.search_by_card_number("BT01-001", true).await;
        assert!(!fallback.is_empty());
        assert!(fallback.len() <= CARD_MATCH_CAP);
        assert!(fallback.iter().all(|d| d.score == 0.0 && d.origin == MatchOrigin::Exact));
        // 카드 컬렉션이 룰 컬렉션보다 먼저
        assert_eq!(fallback[0].doc_type, DocType::Card);

        assert!(engine.search_by_card_number("EX9-999", true).await.is_empty());
    }

    #[tokio::test]
    async fn test_custom_chunker_and_source() {
        let engine = engine().with_chunker(Box::new(RecursiveChunker::new(ChunkConfig::with_size(20, 0))));
        let text = "第一条：卡组由五十张卡牌构成。\n第二条：数码蛋卡组最多五张。";
        let report = engine
            .add_document(
                text,
                DocumentMetadata::new(DocType::Rule, "构筑规则").with_source("rules.pdf"),
            )
            .await
            .unwrap();
        assert_eq!(report.chunk_count, 2);

        let chunks = engine.get_document_chunks(&report.doc_id).await.unwrap();
        assert!(chunks.iter().all(|c| c.metadata.source.as_deref() == Some("rules.pdf")));
        assert!(chunks[0].text.starts_with("第一条"));
    }

    #[tokio::test]
    async fn test_delete_and_chunks() {
        let engine = engine();
        let long: String = (0..80).map(|i| format!("第{}条：规则内容说明。\n", i)).collect();
        let report = engine
            .add_document(&long, DocumentMetadata::new(DocType::Rule, "长规则"))
            .await
            .unwrap();
        assert!(report.chunk_count > 1);

        let chunks = engine.get_document_chunks(&report.doc_id).await.unwrap();
        assert_eq!(chunks.len(), report.chunk_count);
        assert!(chunks.windows(2).all(|w| w[0].metadata.chunk_index < w[1].metadata.chunk_index));

        assert!(!engine.delete_document("never-ingested", DocType::Rule).await);
        assert!(engine.delete_document(&report.doc_id, DocType::Rule).await);
        assert!(!engine.delete_document(&report.doc_id, DocType::Rule).await);
        assert!(engine.get_document_chunks(&report.doc_id).await.unwrap().is_empty());

        let stats = engine.stats().await.unwrap();
        let rule = stats.iter().find(|s| s.doc_type == DocType::Rule).unwrap();
        assert!(rule.exists);
        assert_eq!(rule.chunk_count, 0);
    }
}
