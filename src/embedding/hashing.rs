//! 해시 임베딩 - 네트워크 없이 동작하는 결정적 임베딩
//!
//! 문자 1-gram/2-gram과 영문 단어를 XxHash64로 버킷에 투영한 뒤 L2 정규화합니다.
//! 의미 검색 품질은 낮지만 같은 글자를 공유하는 텍스트끼리 가까워지므로
//! 오프라인 환경과 테스트에서 파이프라인 전체를 돌릴 수 있습니다.

use std::hash::Hasher;

use anyhow::Result;
use async_trait::async_trait;
use twox_hash::XxHash64;

use super::EmbeddingProvider;

/// 기본 차원
pub const HASH_DIMENSION: usize = 256;

#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimension: usize,
}

impl HashEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(feature.as_bytes());
        let h = hasher.finish();
        let idx = (h % self.dimension as u64) as usize;
        // 상위 비트로 부호 결정 (충돌 상쇄)
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        vector[idx] += sign * weight;
    }

    /// 동기 임베딩
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];

        for word in text.split_whitespace() {
            if word.chars().all(|c| c.is_ascii_alphanumeric()) {
                self.add_feature(&mut vector, &word.to_ascii_lowercase(), 1.0);
            }
        }

        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        let mut buf = [0u8; 8];
        for (i, c) in chars.iter().enumerate() {
            self.add_feature(&mut vector, c.encode_utf8(&mut buf), 0.5);
            if let Some(next) = chars.get(i + 1) {
                let bigram: String = [*c, *next].iter().collect();
                self.add_feature(&mut vector, &bigram, 1.0);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(HASH_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}
