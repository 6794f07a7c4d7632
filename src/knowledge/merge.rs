//! 결과 병합 - 정확 매칭 우선, 중복 제거, 개수 제한
//!
//! 점수로 재정렬하지 않습니다. 카드 번호 정확 매칭(거리 0.0)과
//! 벡터 거리는 같은 척도가 아니므로 순서는 출처로만 정해집니다.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use super::document::ResultDoc;

/// 중복 판정에 쓰는 본문 앞부분 길이 (문자 수)
pub const FINGERPRINT_PREFIX_CHARS: usize = 100;

/// 본문 앞부분 지문
pub fn content_fingerprint(content: &str) -> Vec<u8> {
    let prefix: String = content.chars().take(FINGERPRINT_PREFIX_CHARS).collect();
    Sha256::digest(prefix.as_bytes()).to_vec()
}

/// 정확 매칭 + 의미 검색 결과 병합기
#[derive(Debug, Clone, Copy)]
pub struct ResultMerger {
    top_k: usize,
}

impl ResultMerger {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// 최대 결과 수: `top_k + 2 × 카드 번호 수`
    pub fn cap(&self, distinct_cards: usize) -> usize {
        self.top_k + 2 * distinct_cards
    }

    /// 병합
    ///
    /// 1. 정확 매칭 결과(추출 순서) 뒤에 의미 검색 결과
    /// 2. 앞부분 지문이 같은 결과는 먼저 나온 것만 유지
    /// 3. 순서를 유지한 채 `cap`개로 자름
    pub fn merge(
        &self,
        exact: Vec<ResultDoc>,
        semantic: Vec<ResultDoc>,
        distinct_cards: usize,
    ) -> Vec<ResultDoc> {
        let cap = self.cap(distinct_cards);
        let mut seen = HashSet::new();
        let mut merged = Vec::with_capacity(cap.min(exact.len() + semantic.len()));

        for doc in exact.into_iter().chain(semantic) {
            if merged.len() >= cap {
                break;
            }
            if seen.insert(content_fingerprint(&doc.content)) {
                merged.push(doc);
            } else {
                tracing::debug!("Dropping duplicate result from {}", doc.title);
            }
        }

        merged
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::document::{DocType, MatchOrigin};

    fn doc(content: &str, score: f32, origin: MatchOrigin) -> ResultDoc {
        ResultDoc {
            content: content.to_string(),
            content_original: content.to_string(),
            doc_id: "d".to_string(),
            title: "t".to_string(),
            doc_type: DocType::Rule,
            chunk_index: 0,
            source: None,
            score,
            origin,
        }
    }

    #[test]
    fn test_exact_precede_semantic_regardless_of_score() {
        let merger = ResultMerger::new(5);
        let merged = merger.merge(
            vec![doc("【BT1-001】亚古兽", 0.0, MatchOrigin::Exact)],
            vec![
                doc("语义结果A", 0.01, MatchOrigin::Semantic),
                doc("语义结果B", 0.02, MatchOrigin::Semantic),
            ],
            1,
        );
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].origin, MatchOrigin::Exact);
        assert!(merged[1..].iter().all(|d| d.origin == MatchOrigin::Semantic));
    }

    #[test]
    fn test_dedup_by_prefix_first_wins() {
        let merger = ResultMerger::new(5);
        let shared: String = "同".repeat(100);
        let merged = merger.merge(
            vec![doc(&format!("{}exact tail", shared), 0.0, MatchOrigin::Exact)],
            vec![
                doc(&format!("{}semantic tail", shared), 0.3, MatchOrigin::Semantic),
                doc("不同内容", 0.4, MatchOrigin::Semantic),
            ],
            1,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].origin, MatchOrigin::Exact);
        assert_eq!(merged[1].content, "不同内容");

        let fingerprints: HashSet<_> = merged.iter().map(|d| content_fingerprint(&d.content)).collect();
        assert_eq!(fingerprints.len(), merged.len());
    }

    #[test]
    fn test_cap_grows_with_card_count() {
        let merger = ResultMerger::new(2);
        let semantic: Vec<ResultDoc> = (0..10)
            .map(|i| doc(&format!("semantic {}", i), i as f32, MatchOrigin::Semantic))
            .collect();

        assert_eq!(merger.merge(vec![], semantic.clone(), 0).len(), 2);
        let merged = merger.merge(vec![], semantic, 2);
        assert_eq!(merged.len(), 6);
        // 상대 순서 유지
        assert_eq!(merged[5].content, "semantic 5");
    }
}
