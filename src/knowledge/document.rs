//! 문서 데이터 모델
//!
//! 문서 타입별로 컬렉션이 하나씩 존재하고, 각 컬렉션은
//! `{doc_id}_{chunk_index}` 키의 청크 레코드를 가집니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// doc_id 계산에 쓰는 본문 앞부분 길이 (문자 수)
const DOC_ID_PREFIX_CHARS: usize = 100;
/// doc_id 길이 (hex 문자 수)
const DOC_ID_LEN: usize = 12;

// ============================================================================
// DocType
// ============================================================================

/// 문서 타입 (컬렉션 단위)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    /// 종합 룰
    Rule,
    /// 공식 재정 Q&A
    Ruling,
    /// 판례
    Case,
    /// 카드 데이터
    Card,
}

impl DocType {
    /// 전체 타입 (검색 기본값)
    pub const ALL: [DocType; 4] = [DocType::Rule, DocType::Ruling, DocType::Case, DocType::Card];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Rule => "rule",
            DocType::Ruling => "ruling",
            DocType::Case => "case",
            DocType::Card => "card",
        }
    }

    /// 물리 컬렉션 이름
    pub fn collection_name(&self) -> String {
        format!("card_game_{}", self.as_str())
    }

    /// 답변 컨텍스트에 붙는 표시 라벨
    pub fn label(&self) -> &'static str {
        match self {
            DocType::Rule => "规则",
            DocType::Ruling => "官方裁定",
            DocType::Case => "判例",
            DocType::Card => "卡牌",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rule" => Ok(DocType::Rule),
            "ruling" => Ok(DocType::Ruling),
            "case" => Ok(DocType::Case),
            "card" => Ok(DocType::Card),
            other => anyhow::bail!("Unknown document type: {}", other),
        }
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// 수집 시 호출자가 넘기는 문서 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub doc_type: DocType,
    pub title: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub effective_date: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DocumentMetadata {
    pub fn new(doc_type: DocType, title: impl Into<String>) -> Self {
        Self {
            doc_type,
            title: title.into(),
            version: None,
            effective_date: None,
            source: None,
            tags: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// 청크 하나에 저장되는 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_id: String,
    pub title: String,
    pub doc_type: DocType,
    pub version: Option<String>,
    pub effective_date: Option<String>,
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub chunk_index: i32,
    pub created_at: DateTime<Utc>,
}

impl ChunkMetadata {
    /// 레코드 키 `{doc_id}_{chunk_index}`
    pub fn record_id(&self) -> String {
        format!("{}_{}", self.doc_id, self.chunk_index)
    }
}

/// 저장된 청크 (임베딩 제외)
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// 태그 저장 형식 (쉼표 구분)
pub fn join_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

// ============================================================================
// API Results
// ============================================================================

/// 문서 목록 항목 (청크 메타데이터를 doc_id별로 집계)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub title: String,
    pub doc_type: DocType,
    pub chunk_count: usize,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// 수집 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub title: String,
    pub doc_type: DocType,
    pub chunk_count: usize,
}

/// 결과 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOrigin {
    /// 카드 번호 정확 매칭
    Exact,
    /// 벡터 유사도 검색
    Semantic,
}

/// 검색 결과 문서
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultDoc {
    /// 표시용 본문 (역번역 적용 시 번역문)
    pub content: String,
    /// 저장된 원문
    pub content_original: String,
    pub doc_id: String,
    pub title: String,
    pub doc_type: DocType,
    pub chunk_index: i32,
    pub source: Option<String>,
    /// 거리 점수 (낮을수록 유사, 정확 매칭은 0.0)
    pub score: f32,
    pub origin: MatchOrigin,
}

impl ResultDoc {
    /// 저장된 청크로부터 생성
    pub fn from_chunk(chunk: StoredChunk, score: f32, origin: MatchOrigin) -> Self {
        let StoredChunk { text, metadata } = chunk;
        Self {
            content: text.clone(),
            content_original: text,
            doc_id: metadata.doc_id,
            title: metadata.title,
            doc_type: metadata.doc_type,
            chunk_index: metadata.chunk_index,
            source: metadata.source,
            score,
            origin,
        }
    }
}

// ============================================================================
// Fingerprints
// ============================================================================

/// 문서 ID: SHA-256(`{title}:{본문 앞 100자}`)의 앞 12자
///
/// 같은 제목과 앞부분을 가진 재수집은 같은 ID가 됩니다.
pub fn generate_doc_id(title: &str, content: &str) -> String {
    let prefix: String = content.chars().take(DOC_ID_PREFIX_CHARS).collect();
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b":");
    hasher.update(prefix.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..DOC_ID_LEN].to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_type_names() {
        assert_eq!(DocType::Ruling.collection_name(), "card_game_ruling");
        assert_eq!(DocType::Case.label(), "判例");
        assert_eq!("RULE".parse::<DocType>().unwrap(), DocType::Rule);
        assert!("deck".parse::<DocType>().is_err());
    }

    #[test]
    fn test_doc_id_depends_on_prefix_only() {
        let body: String = "规".repeat(100);
        let a = generate_doc_id("综合规则", &format!("{}A", body));
        let b = generate_doc_id("综合规则", &format!("{}B", body));
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);

        let c = generate_doc_id("其他标题", &body);
        assert_ne!(a, c);
    }

    #[test]
    fn test_tags_round_trip() {
        let tags = vec!["进化".to_string(), " ".to_string(), "安防 ".to_string()];
        let joined = join_tags(&tags);
        assert_eq!(joined, "进化,安防");
        assert_eq!(split_tags(&joined), vec!["进化", "安防"]);
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn test_record_id() {
        let meta = ChunkMetadata {
            doc_id: "abc123".to_string(),
            title: "t".to_string(),
            doc_type: DocType::Rule,
            version: None,
            effective_date: None,
            source: None,
            tags: vec![],
            chunk_index: 3,
            created_at: Utc::now(),
        };
        assert_eq!(meta.record_id(), "abc123_3");
    }
}
