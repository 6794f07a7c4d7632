//! 인메모리 벡터 저장소
//!
//! LanceDB 없이 검색 파이프라인을 돌릴 때 사용합니다.
//! 거리 척도는 LanceDB 기본값과 같은 제곱 L2입니다.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::document::{DocType, StoredChunk};
use super::vector::{
    squared_l2_distance, uniform_dimension, ChunkFilter, SearchResult, StoreError, VectorEntry,
    VectorStore,
};

struct Row {
    chunk: StoredChunk,
    embedding: Vec<f32>,
}

#[derive(Default)]
struct Collection {
    dimension: usize,
    rows: Vec<Row>,
}

/// 컬렉션별 Vec 저장소
#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<DocType, Collection>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend(anyhow::anyhow!("memory store lock poisoned"))
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert_batch(
        &self,
        doc_type: DocType,
        entries: &[VectorEntry],
    ) -> Result<usize, StoreError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let dimension = uniform_dimension(entries)?;

        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let collection = collections.entry(doc_type).or_insert_with(|| Collection {
            dimension,
            rows: Vec::new(),
        });
        if collection.dimension != dimension {
            return Err(StoreError::DimensionMismatch {
                expected: collection.dimension,
                actual: dimension,
            });
        }

        collection.rows.extend(entries.iter().map(|e| Row {
            chunk: StoredChunk {
                text: e.text.clone(),
                metadata: e.metadata.clone(),
            },
            embedding: e.embedding.clone(),
        }));
        Ok(entries.len())
    }

    async fn search(
        &self,
        doc_type: DocType,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let collection = collections
            .get(&doc_type)
            .ok_or_else(|| StoreError::CollectionMissing(doc_type.collection_name()))?;
        if collection.dimension != query_embedding.len() {
            return Err(StoreError::DimensionMismatch {
                expected: collection.dimension,
                actual: query_embedding.len(),
            });
        }

        let mut results: Vec<SearchResult> = collection
            .rows
            .iter()
            .map(|row| SearchResult {
                chunk: row.chunk.clone(),
                distance: squared_l2_distance(&row.embedding, query_embedding),
            })
            .collect();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(limit);
        Ok(results)
    }

    async fn scan(
        &self,
        doc_type: DocType,
        filter: &ChunkFilter,
    ) -> Result<Vec<StoredChunk>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let collection = collections
            .get(&doc_type)
            .ok_or_else(|| StoreError::CollectionMissing(doc_type.collection_name()))?;

        Ok(collection
            .rows
            .iter()
            .filter(|row| filter.matches(&row.chunk))
            .map(|row| row.chunk.clone())
            .collect())
    }

    async fn delete_by_doc_id(&self, doc_type: DocType, doc_id: &str) -> Result<usize, StoreError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let Some(collection) = collections.get_mut(&doc_type) else {
            return Ok(0);
        };

        let before = collection.rows.len();
        collection.rows.retain(|row| row.chunk.metadata.doc_id != doc_id);
        Ok(before - collection.rows.len())
    }

    async fn count(&self, doc_type: DocType) -> Result<usize, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.get(&doc_type).map(|c| c.rows.len()).unwrap_or(0))
    }

    async fn has_collection(&self, doc_type: DocType) -> Result<bool, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.contains_key(&doc_type))
    }
}

// ============================================================================
// Tests
// ============================================================================
