//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 텍스트를 벡터로 변환하는 프로바이더들과, 모든 컬렉션/요청이 공유하는
//! 지연 초기화 핸들(`LazyEmbedder`)을 제공합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = LazyEmbedder::from_config(&config);
//! let vector = embedder.get().await?.embed_query("安防效果").await?;
//! ```

mod gemini;
mod hashing;
mod ollama;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::config::{EmbeddingBackend, JudgeConfig};

pub use gemini::{GeminiEmbedding, DEFAULT_DIMENSION};
pub use hashing::{HashEmbedding, HASH_DIMENSION};
pub use ollama::{OllamaEmbedding, BGE_M3_DIMENSION};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 여러 요청이 같은 인스턴스를 동시에 쓰므로 `Send + Sync`여야 하고,
/// 내부 상태가 있다면 구현체가 직접 동기화합니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 문서(청크) 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 검색 질문 임베딩 (기본 구현: 문서와 동일)
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// LazyEmbedder
// ============================================================================

type EmbedderFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn EmbeddingProvider>>> + Send>>;
type EmbedderFactory = Box<dyn Fn() -> EmbedderFuture + Send + Sync>;

/// 지연 초기화되는 공유 임베딩 핸들
///
/// 첫 `get()`에서 팩토리를 한 번만 실행하고, 이후에는 같은 인스턴스를 돌려줍니다.
/// 동시에 여러 호출이 들어와도 팩토리는 한 번만 실행됩니다.
/// 초기화가 실패하면 다음 호출에서 다시 시도합니다.
pub struct LazyEmbedder {
    cell: OnceCell<Arc<dyn EmbeddingProvider>>,
    factory: EmbedderFactory,
}

impl LazyEmbedder {
    /// 팩토리로 생성
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn EmbeddingProvider>>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(move || Box::pin(factory())),
        }
    }

    /// 이미 만들어진 인스턴스로 생성
    pub fn ready(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let fallback = provider.clone();
        Self {
            cell: OnceCell::new_with(Some(provider)),
            factory: Box::new(move || {
                let provider = fallback.clone();
                Box::pin(async move { Ok(provider) })
            }),
        }
    }

    /// 설정의 백엔드로 생성 (네트워크 연결은 첫 사용 시점)
    pub fn from_config(config: &JudgeConfig) -> Self {
        let config = config.clone();
        Self::new(move || {
            let config = config.clone();
            async move { create_embedder(&config) }
        })
    }

    /// 공유 인스턴스 (필요하면 초기화)
    pub async fn get(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let provider = self
            .cell
            .get_or_try_init(|| (self.factory)())
            .await
            .context("Failed to initialise embedding model")?;
        Ok(provider.clone())
    }

    /// 초기화 여부
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 맞는 임베딩 프로바이더 생성
pub fn create_embedder(config: &JudgeConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.embedding {
        EmbeddingBackend::Gemini => {
            let api_key = config.gemini_api_key.clone().ok_or_else(|| {
                anyhow::anyhow!(
                    "GEMINI_API_KEY or GOOGLE_AI_API_KEY not set.\n\
                     Set: export GEMINI_API_KEY=your-api-key\n\
                     Get your API key at: https://aistudio.google.com/app/apikey"
                )
            })?;
            Arc::new(GeminiEmbedding::new(api_key)?)
        }
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedding::new(
            &config.ollama_url,
            &config.ollama_embed_model,
        )?),
        EmbeddingBackend::Hash => Arc::new(HashEmbedding::default()),
    };

    tracing::info!(
        "Using {} embedding (dimension: {})",
        provider.name(),
        provider.dimension()
    );
    Ok(provider)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_lazy_factory_runs_once_under_concurrency() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy = Arc::new(LazyEmbedder::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Ok(Arc::new(HashEmbedding::new(8)) as Arc<dyn EmbeddingProvider>)
            }
        }));

        assert!(!lazy.is_initialized());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lazy = lazy.clone();
            handles.push(tokio::spawn(async move { lazy.get().await.map(|e| e.dimension()) }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 8);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lazy.is_initialized());
    }

    #[tokio::test]
    async fn test_lazy_retries_after_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy = LazyEmbedder::new(move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    anyhow::bail!("model not downloaded");
                }
                Ok(Arc::new(HashEmbedding::new(4)) as Arc<dyn EmbeddingProvider>)
            }
        });

        assert!(lazy.get().await.is_err());
        assert!(lazy.get().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ready_handle() {
        let lazy = LazyEmbedder::ready(Arc::new(HashEmbedding::new(4)));
        assert!(lazy.is_initialized());
        assert_eq!(lazy.get().await.unwrap().name(), "hash");
    }

    #[test]
    fn test_gemini_backend_requires_key() {
        let mut config = JudgeConfig::from_lookup(|key| match key {
            "DTCG_JUDGE_DATA_DIR" => Some("/tmp/judge".to_string()),
            _ => None,
        })
        .unwrap();
        config.embedding = EmbeddingBackend::Gemini;
        assert!(create_embedder(&config).is_err());

        config.embedding = EmbeddingBackend::Hash;
        assert_eq!(create_embedder(&config).unwrap().dimension(), HASH_DIMENSION);
    }
}
