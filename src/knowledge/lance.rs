//! LanceDB Vector Store - 문서 타입별 테이블
//!
//! 문서 타입마다 `card_game_{type}` 테이블을 하나씩 두고,
//! 청크 텍스트와 메타데이터를 임베딩과 같은 행에 저장합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::Table;

use super::document::{split_tags, join_tags, ChunkMetadata, DocType, StoredChunk};
use super::vector::{
    uniform_dimension, ChunkFilter, SearchResult, StoreError, VectorEntry, VectorStore,
};

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// 임베딩 차원은 테이블을 처음 만들 때의 엔트리에서 정해집니다.
pub struct LanceVectorStore {
    db: Connection,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self { db })
    }

    /// 청크 테이블 스키마
    fn create_schema(dimension: i32) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("doc_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("doc_type", DataType::Utf8, false),
            Field::new("version", DataType::Utf8, true),
            Field::new("effective_date", DataType::Utf8, true),
            Field::new("source", DataType::Utf8, true),
            Field::new("tags", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(entries: &[VectorEntry], dimension: usize) -> anyhow::Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }
        let dimension = i32::try_from(dimension).context("Embedding dimension too large")?;

        let ids: Vec<String> = entries.iter().map(|e| e.metadata.record_id()).collect();
        let doc_ids: Vec<&str> = entries.iter().map(|e| e.metadata.doc_id.as_str()).collect();
        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.metadata.chunk_index).collect();
        let chunk_texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        let titles: Vec<&str> = entries.iter().map(|e| e.metadata.title.as_str()).collect();
        let doc_types: Vec<&str> = entries.iter().map(|e| e.metadata.doc_type.as_str()).collect();
        let versions: Vec<Option<&str>> =
            entries.iter().map(|e| e.metadata.version.as_deref()).collect();
        let effective_dates: Vec<Option<&str>> = entries
            .iter()
            .map(|e| e.metadata.effective_date.as_deref())
            .collect();
        let sources: Vec<Option<&str>> =
            entries.iter().map(|e| e.metadata.source.as_deref()).collect();
        let tags: Vec<String> = entries.iter().map(|e| join_tags(&e.metadata.tags)).collect();
        let created: Vec<String> = entries
            .iter()
            .map(|e| e.metadata.created_at.to_rfc3339())
            .collect();

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema(dimension)),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(doc_ids)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(StringArray::from(titles)),
                Arc::new(StringArray::from(doc_types)),
                Arc::new(StringArray::from(versions)),
                Arc::new(StringArray::from(effective_dates)),
                Arc::new(StringArray::from(sources)),
                Arc::new(StringArray::from(tags)),
                Arc::new(StringArray::from(created)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")?;
        Ok(names.iter().any(|n| n == name))
    }

    /// 기존 테이블 열기 (없으면 CollectionMissing)
    async fn open_existing(&self, doc_type: DocType) -> Result<Table, StoreError> {
        let name = doc_type.collection_name();
        if !self.table_exists(&name).await? {
            return Err(StoreError::CollectionMissing(name));
        }
        let table = self
            .db
            .open_table(&name)
            .execute()
            .await
            .with_context(|| format!("Failed to open table {}", name))?;
        Ok(table)
    }

    /// 테이블의 임베딩 차원
    async fn table_dimension(table: &Table) -> Result<usize, StoreError> {
        let schema = table.schema().await.context("Failed to read table schema")?;
        let field = schema
            .field_with_name("embedding")
            .map_err(|e| StoreError::Backend(anyhow!("Missing embedding column: {}", e)))?;
        match field.data_type() {
            DataType::FixedSizeList(_, size) => Ok(*size as usize),
            other => Err(StoreError::Backend(anyhow!(
                "Unexpected embedding column type: {:?}",
                other
            ))),
        }
    }

    /// RecordBatch 행들을 청크로 변환 (메타데이터가 깨진 행은 건너뜀)
    fn batch_to_chunks(batch: &RecordBatch) -> Result<Vec<(StoredChunk, usize)>, StoreError> {
        let doc_ids = string_column(batch, "doc_id")?;
        let chunk_texts = string_column(batch, "chunk_text")?;
        let titles = string_column(batch, "title")?;
        let doc_types = string_column(batch, "doc_type")?;
        let versions = string_column(batch, "version")?;
        let effective_dates = string_column(batch, "effective_date")?;
        let sources = string_column(batch, "source")?;
        let tags = string_column(batch, "tags")?;
        let created = string_column(batch, "created_at")?;
        let chunk_indices = batch
            .column_by_name("chunk_index")
            .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
            .ok_or_else(|| StoreError::Backend(anyhow!("Missing chunk_index column")))?;

        let optional = |col: &StringArray, i: usize| -> Option<String> {
            if col.is_null(i) {
                None
            } else {
                Some(col.value(i).to_string())
            }
        };

        let mut chunks = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let doc_type = match doc_types.value(i).parse::<DocType>() {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("Skipping row {} with bad doc_type: {}", doc_ids.value(i), e);
                    continue;
                }
            };
            let created_at = match DateTime::parse_from_rfc3339(created.value(i)) {
                Ok(t) => t.with_timezone(&Utc),
                Err(e) => {
                    tracing::warn!("Skipping row {} with bad created_at: {}", doc_ids.value(i), e);
                    continue;
                }
            };

            let chunk = StoredChunk {
                text: chunk_texts.value(i).to_string(),
                metadata: ChunkMetadata {
                    doc_id: doc_ids.value(i).to_string(),
                    title: titles.value(i).to_string(),
                    doc_type,
                    version: optional(versions, i),
                    effective_date: optional(effective_dates, i),
                    source: optional(sources, i),
                    tags: split_tags(tags.value(i)),
                    chunk_index: chunk_indices.value(i),
                    created_at,
                },
            };
            chunks.push((chunk, i));
        }

        Ok(chunks)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StoreError::Backend(anyhow!("Missing {} column", name)))
}

/// SQL 문자열 리터럴 이스케이프
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// LIKE 패턴 이스케이프 (와일드카드는 Rust 쪽 재검증으로 걸러짐)
fn like_pattern(needle: &str) -> String {
    quote(&format!("%{}%", needle))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn insert_batch(
        &self,
        doc_type: DocType,
        entries: &[VectorEntry],
    ) -> Result<usize, StoreError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let dimension = uniform_dimension(entries)?;
        let batch = Self::entries_to_batch(entries, dimension)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        let name = doc_type.collection_name();

        if self.table_exists(&name).await? {
            // 기존 테이블에 추가
            let table = self.open_existing(doc_type).await?;
            let expected = Self::table_dimension(&table).await?;
            if expected != dimension {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: dimension,
                });
            }

            table
                .add(batches)
                .execute()
                .await
                .context("Failed to add vectors to table")?;
        } else {
            // 새 테이블 생성
            self.db
                .create_table(&name, batches)
                .execute()
                .await
                .with_context(|| format!("Failed to create table {}", name))?;
            tracing::info!("Created collection {} (dim={})", name, dimension);
        }

        Ok(entries.len())
    }

    async fn search(
        &self,
        doc_type: DocType,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let table = self.open_existing(doc_type).await?;
        let expected = Self::table_dimension(&table).await?;
        if expected != query_embedding.len() {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: query_embedding.len(),
            });
        }

        // 벡터 검색
        let stream = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;
        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to read search results")?;

        let mut results = Vec::new();
        for batch in batches {
            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| StoreError::Backend(anyhow!("Missing _distance column")))?;

            for (chunk, row) in Self::batch_to_chunks(&batch)? {
                results.push(SearchResult {
                    chunk,
                    distance: distances.value(row).max(0.0),
                });
            }
        }

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(results)
    }

    async fn scan(
        &self,
        doc_type: DocType,
        filter: &ChunkFilter,
    ) -> Result<Vec<StoredChunk>, StoreError> {
        let table = self.open_existing(doc_type).await?;

        let predicate = match filter {
            ChunkFilter::All => None,
            ChunkFilter::DocId(id) => Some(format!("doc_id = {}", quote(id))),
            ChunkFilter::Contains(needle) => Some(format!("chunk_text LIKE {}", like_pattern(needle))),
        };

        let total = table
            .count_rows(predicate.clone())
            .await
            .context("Failed to count rows")?;
        if total == 0 {
            return Ok(vec![]);
        }

        let mut query = table.query().limit(total);
        if let Some(predicate) = predicate {
            query = query.only_if(predicate);
        }
        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .context("Failed to execute scan")?
            .try_collect()
            .await
            .context("Failed to read scan results")?;

        let mut chunks = Vec::new();
        for batch in &batches {
            chunks.extend(
                Self::batch_to_chunks(batch)?
                    .into_iter()
                    .map(|(chunk, _)| chunk)
                    .filter(|chunk| filter.matches(chunk)),
            );
        }
        Ok(chunks)
    }

    async fn delete_by_doc_id(&self, doc_type: DocType, doc_id: &str) -> Result<usize, StoreError> {
        let table = match self.open_existing(doc_type).await {
            Ok(table) => table,
            Err(StoreError::CollectionMissing(_)) => return Ok(0),
            Err(e) => return Err(e),
        };

        let filter = format!("doc_id = {}", quote(doc_id));
        let matching = table
            .count_rows(Some(filter.clone()))
            .await
            .context("Failed to count rows for doc_id")?;
        if matching == 0 {
            return Ok(0);
        }

        table
            .delete(&filter)
            .await
            .context("Failed to delete vectors")?;
        Ok(matching)
    }

    async fn count(&self, doc_type: DocType) -> Result<usize, StoreError> {
        let table = match self.open_existing(doc_type).await {
            Ok(table) => table,
            Err(StoreError::CollectionMissing(_)) => return Ok(0),
            Err(e) => return Err(e),
        };

        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }

    async fn has_collection(&self, doc_type: DocType) -> Result<bool, StoreError> {
        self.table_exists(&doc_type.collection_name()).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIM: usize = 8;

    fn create_test_entry(doc_id: &str, chunk_index: i32, text: &str, fill: f32) -> VectorEntry {
        VectorEntry {
            text: text.to_string(),
            metadata: ChunkMetadata {
                doc_id: doc_id.to_string(),
                title: format!("title {}", doc_id),
                doc_type: DocType::Ruling,
                version: Some("1.0".to_string()),
                effective_date: None,
                source: None,
                tags: vec!["进化".to_string(), "安防".to_string()],
                chunk_index,
                created_at: Utc::now(),
            },
            embedding: vec![fill; DIM],
        }
    }

    #[tokio::test]
    async fn test_lance_store_basic() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("test.lance"))
            .await
            .unwrap();

        // 초기 상태
        assert_eq!(store.count(DocType::Ruling).await.unwrap(), 0);
        assert!(!store.has_collection(DocType::Ruling).await.unwrap());
        assert!(store
            .search(DocType::Ruling, &[0.0; DIM], 3)
            .await
            .unwrap_err()
            .is_missing());

        // 삽입
        let entries = vec![
            create_test_entry("doc1", 0, "Q: 进化时效果", 0.1),
            create_test_entry("doc1", 1, "A: 可以发动", 0.2),
        ];
        assert_eq!(store.insert_batch(DocType::Ruling, &entries).await.unwrap(), 2);
        assert_eq!(store.count(DocType::Ruling).await.unwrap(), 2);

        // 메타데이터 복원
        let chunks = store
            .scan(DocType::Ruling, &ChunkFilter::DocId("doc1".into()))
            .await
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.tags, vec!["进化", "安防"]);
        assert_eq!(chunks[0].metadata.version.as_deref(), Some("1.0"));
        assert_eq!(chunks[0].metadata.source, None);
    }

    #[tokio::test]
    async fn test_lance_search_and_scan() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("search.lance"))
            .await
            .unwrap();

        let entries = vec![
            create_test_entry("a", 0, "【BT1-001】亚古兽", 0.1),
            create_test_entry("b", 0, "其他内容", 0.5),
            create_test_entry("c", 0, "【BT1-001_P1】亚古兽 异画", 0.9),
        ];
        store.insert_batch(DocType::Ruling, &entries).await.unwrap();

        let results = store.search(DocType::Ruling, &[0.1; DIM], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.metadata.doc_id, "a");
        assert!(results[0].distance <= results[1].distance);

        let hits = store
            .scan(DocType::Ruling, &ChunkFilter::Contains("【BT1-001".into()))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_lance_delete_and_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("delete.lance"))
            .await
            .unwrap();

        let entries = vec![
            create_test_entry("x", 0, "one", 0.1),
            create_test_entry("x", 1, "two", 0.1),
            create_test_entry("y'quote", 0, "three", 0.1),
        ];
        store.insert_batch(DocType::Ruling, &entries).await.unwrap();

        assert_eq!(store.delete_by_doc_id(DocType::Ruling, "x").await.unwrap(), 2);
        assert_eq!(store.delete_by_doc_id(DocType::Ruling, "x").await.unwrap(), 0);
        assert_eq!(store.delete_by_doc_id(DocType::Ruling, "y'quote").await.unwrap(), 1);
        assert_eq!(store.delete_by_doc_id(DocType::Case, "x").await.unwrap(), 0);

        let mut wrong = create_test_entry("z", 0, "four", 0.1);
        wrong.embedding = vec![0.1; DIM + 1];
        let err = store.insert_batch(DocType::Ruling, &[wrong]).await.unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_lance_skips_rows_with_broken_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("broken.lance"))
            .await
            .unwrap();
        store
            .insert_batch(DocType::Ruling, &[create_test_entry("good", 0, "正常的裁定", 0.1)])
            .await
            .unwrap();

        // 메타데이터가 깨진 행을 직접 기록 (doc_type 5번, created_at 10번 컬럼)
        let batch = LanceVectorStore::entries_to_batch(
            &[
                create_test_entry("bad-type", 0, "类型损坏", 0.1),
                create_test_entry("bad-date", 0, "日期损坏", 0.1),
            ],
            DIM,
        )
        .unwrap();
        let mut columns = batch.columns().to_vec();
        columns[5] = Arc::new(StringArray::from(vec!["bogus", "ruling"]));
        columns[10] = Arc::new(StringArray::from(vec![
            Utc::now().to_rfc3339(),
            "not-a-date".to_string(),
        ]));
        let broken = RecordBatch::try_new(batch.schema(), columns).unwrap();

        let table = store.open_existing(DocType::Ruling).await.unwrap();
        table
            .add(RecordBatchIterator::new(vec![Ok(broken.clone())], broken.schema()))
            .execute()
            .await
            .unwrap();
        assert_eq!(store.count(DocType::Ruling).await.unwrap(), 3);

        let scanned = store.scan(DocType::Ruling, &ChunkFilter::All).await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].metadata.doc_id, "good");

        let found = store.search(DocType::Ruling, &[0.1; DIM], 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].chunk.metadata.doc_id, "good");
    }
}
