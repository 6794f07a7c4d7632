//! 환경변수 기반 설정
//!
//! 모든 값은 프로세스 시작 시 한 번 읽습니다. 테스트에서는
//! `from_lookup`에 임의의 조회 함수를 넘겨 환경변수를 건드리지 않습니다.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// 기본 데이터 디렉토리 이름
const DATA_DIR_NAME: &str = ".dtcg-judge";

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_LLM_MODEL: &str = "qwen2:7b";
pub const DEFAULT_OLLAMA_EMBED_MODEL: &str = "bge-m3";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TOP_K: usize = 5;

// ============================================================================
// Backends
// ============================================================================

/// 임베딩 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EmbeddingBackend {
    /// Gemini embedContent API
    Gemini,
    /// 로컬 Ollama /api/embeddings
    Ollama,
    /// 오프라인 해시 임베딩 (네트워크 없음)
    Hash,
}

impl FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" | "local" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            other => anyhow::bail!("Unknown embedding backend: {}", other),
        }
    }
}

/// 답변 생성 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LlmBackend {
    Gemini,
    Ollama,
    #[value(name = "openai")]
    OpenAi,
}

impl FromStr for LlmBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" | "local" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => anyhow::bail!("Unknown LLM backend: {}", other),
        }
    }
}

// ============================================================================
// JudgeConfig
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub data_dir: PathBuf,
    pub embedding: EmbeddingBackend,
    pub llm: LlmBackend,
    pub ollama_url: String,
    pub ollama_llm_model: String,
    pub ollama_embed_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_url: String,
    pub llm_timeout: Duration,
    pub top_k: usize,
    /// 명시적으로 지정된 용어집 파일 (OS 경로 목록 구분자, 비어 있으면 `<data_dir>/glossary`)
    pub glossary_paths: Vec<PathBuf>,
    pub cards_path: PathBuf,
}

impl JudgeConfig {
    /// 프로세스 환경변수에서 읽기
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 조회 함수로 읽기 (빈 문자열은 미설정으로 취급)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = match get("DTCG_JUDGE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        // 우선순위: GEMINI_API_KEY > GOOGLE_AI_API_KEY
        let gemini_api_key = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_AI_API_KEY"));

        let embedding = match get("DTCG_JUDGE_EMBEDDING") {
            Some(v) => v.parse()?,
            None if gemini_api_key.is_some() => EmbeddingBackend::Gemini,
            None => EmbeddingBackend::Hash,
        };
        let llm = match get("DTCG_JUDGE_LLM") {
            Some(v) => v.parse()?,
            None => LlmBackend::Ollama,
        };

        let llm_timeout = match get("DTCG_JUDGE_LLM_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("Invalid DTCG_JUDGE_LLM_TIMEOUT_SECS: {}", v))?,
            ),
            None => Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        };
        let top_k = match get("DTCG_JUDGE_TOP_K") {
            Some(v) => v
                .parse()
                .with_context(|| format!("Invalid DTCG_JUDGE_TOP_K: {}", v))?,
            None => DEFAULT_TOP_K,
        };

        let glossary_paths = get("DTCG_JUDGE_GLOSSARY")
            .map(|v| {
                std::env::split_paths(&v)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let cards_path = get("DTCG_JUDGE_CARDS")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("cards"));

        Ok(Self {
            embedding,
            llm,
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            ollama_llm_model: get("OLLAMA_LLM_MODEL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_LLM_MODEL.to_string()),
            ollama_embed_model: get("OLLAMA_EMBED_MODEL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_EMBED_MODEL.to_string()),
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            llm_timeout,
            top_k,
            glossary_paths,
            cards_path,
            data_dir,
        })
    }

    /// LanceDB 경로
    pub fn lance_path(&self) -> PathBuf {
        self.data_dir.join("vectors.lance")
    }

    /// 실제로 읽을 용어집 파일 목록
    ///
    /// 명시 목록이 없으면 `<data_dir>/glossary/*.json`을 이름순으로 (나중 파일이 우선).
    pub fn glossary_files(&self) -> Result<Vec<PathBuf>> {
        if !self.glossary_paths.is_empty() {
            return Ok(self.glossary_paths.clone());
        }
        json_files_in(&self.data_dir.join("glossary"))
    }
}

/// 데이터 디렉토리 기본값
///
/// Windows: %LOCALAPPDATA%\.dtcg-judge
/// Linux/Mac: ~/.local/share/.dtcg-judge
pub fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;
    Ok(base.join(DATA_DIR_NAME))
}

/// 디렉토리의 *.json 파일 (정렬, 디렉토리가 없으면 빈 목록)
fn json_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {:?}", dir))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    Ok(files)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn config_from(pairs: &[(&str, &str)]) -> Result<JudgeConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        JudgeConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_keys() {
        let config = config_from(&[("DTCG_JUDGE_DATA_DIR", "/tmp/judge")]).unwrap();
        assert_eq!(config.embedding, EmbeddingBackend::Hash);
        assert_eq!(config.llm, LlmBackend::Ollama);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.llm_timeout, Duration::from_secs(60));
        assert_eq!(config.ollama_llm_model, "qwen2:7b");
        assert_eq!(config.cards_path, PathBuf::from("/tmp/judge/cards"));
        assert_eq!(config.lance_path(), PathBuf::from("/tmp/judge/vectors.lance"));
    }

    #[test]
    fn test_api_key_selects_gemini_embedding() {
        let config = config_from(&[
            ("DTCG_JUDGE_DATA_DIR", "/tmp/judge"),
            ("GOOGLE_AI_API_KEY", "k2"),
            ("GEMINI_API_KEY", "  "),
        ])
        .unwrap();
        assert_eq!(config.gemini_api_key.as_deref(), Some("k2"));
        assert_eq!(config.embedding, EmbeddingBackend::Gemini);
    }

    #[test]
    fn test_explicit_values_and_errors() {
        let config = config_from(&[
            ("DTCG_JUDGE_DATA_DIR", "/tmp/judge"),
            ("DTCG_JUDGE_LLM", "OpenAI"),
            ("DTCG_JUDGE_EMBEDDING", "ollama"),
            ("DTCG_JUDGE_TOP_K", "8"),
            ("DTCG_JUDGE_GLOSSARY", "a.json"),
        ])
        .unwrap();
        assert_eq!(config.llm, LlmBackend::OpenAi);
        assert_eq!(config.embedding, EmbeddingBackend::Ollama);
        assert_eq!(config.top_k, 8);
        assert_eq!(
            config.glossary_files().unwrap(),
            vec![PathBuf::from("a.json")]
        );

        assert!(config_from(&[("DTCG_JUDGE_DATA_DIR", "/x"), ("DTCG_JUDGE_LLM", "claude")]).is_err());
        assert!(config_from(&[("DTCG_JUDGE_DATA_DIR", "/x"), ("DTCG_JUDGE_TOP_K", "many")]).is_err());
    }

    #[test]
    fn test_glossary_directory_sorted() {
        let dir = TempDir::new().unwrap();
        let glossary = dir.path().join("glossary");
        std::fs::create_dir_all(&glossary).unwrap();
        std::fs::write(glossary.join("b.json"), "{}").unwrap();
        std::fs::write(glossary.join("a.json"), "{}").unwrap();
        std::fs::write(glossary.join("notes.txt"), "").unwrap();

        let config = config_from(&[("DTCG_JUDGE_DATA_DIR", dir.path().to_str().unwrap())]).unwrap();
        let files = config.glossary_files().unwrap();
        assert_eq!(files, vec![glossary.join("a.json"), glossary.join("b.json")]);
    }
}
