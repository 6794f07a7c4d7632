//! 용어 번역기 - 중일 양방향 용어 사전
//!
//! - 질의 확장: 중국어 질문 → "원문 + 일본어 변환문" (일본어 문서 벡터와도 매칭되도록)
//! - 결과 역번역: 일본어 문서 텍스트 → 중국어 용어로 치환
//!
//! 사전은 프로세스 시작 시 한 번 로드하고 이후 변경하지 않습니다.

mod trie;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use trie::{TermSubstitution, TermTrie};

/// 분류 없는 항목의 기본 카테고리
const DEFAULT_CATEGORY: &str = "general";

// ============================================================================
// Types
// ============================================================================

/// 용어 항목
///
/// `source_term`은 질문 쪽 언어(중국어), `target_term`은 문서 쪽 언어(일본어).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminologyEntry {
    #[serde(alias = "zh")]
    pub source_term: String,
    #[serde(alias = "ja")]
    pub target_term: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// 용어집 JSON 형태
///
/// 용어집 파일은 `일본어 → 중국어` 방향으로 작성되어 있습니다.
#[derive(Debug, Clone, PartialEq)]
pub enum GlossaryShape {
    /// `{"카테고리": {"ja": "zh", ...}, ...}`
    Categorized(Vec<(String, Vec<(String, String)>)>),
    /// `{"ja": "zh", ...}`
    Flat(Vec<(String, String)>),
    /// `[{"source_term": "zh", "target_term": "ja", "category": "..."}, ...]`
    Entries(Vec<TerminologyEntry>),
}

/// 용어집 파싱 에러
#[derive(Debug, Error)]
pub enum GlossaryError {
    #[error("invalid glossary JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported glossary shape: {0}")]
    UnsupportedShape(&'static str),
}

impl GlossaryShape {
    /// JSON 값의 형태 판별
    ///
    /// 객체 안에 객체 값이 하나라도 있으면 카테고리 형태로 보고,
    /// 그 외 문자열 값은 무시합니다.
    pub fn classify(value: Value) -> Result<Self, GlossaryError> {
        match value {
            Value::Array(items) => {
                let entries = items
                    .into_iter()
                    .map(serde_json::from_value::<TerminologyEntry>)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Entries(entries))
            }
            Value::Object(map) => {
                if map.values().any(Value::is_object) {
                    let categories = map
                        .into_iter()
                        .filter_map(|(category, terms)| match terms {
                            Value::Object(terms) => Some((category, string_pairs(terms))),
                            _ => {
                                tracing::debug!("Skipping non-object glossary category: {}", category);
                                None
                            }
                        })
                        .collect();
                    Ok(Self::Categorized(categories))
                } else {
                    Ok(Self::Flat(string_pairs(map)))
                }
            }
            Value::Null => Err(GlossaryError::UnsupportedShape("null")),
            Value::Bool(_) => Err(GlossaryError::UnsupportedShape("bool")),
            Value::Number(_) => Err(GlossaryError::UnsupportedShape("number")),
            Value::String(_) => Err(GlossaryError::UnsupportedShape("string")),
        }
    }

    /// 용어 항목 목록으로 변환 (파일 내 순서 유지)
    pub fn into_entries(self) -> Vec<TerminologyEntry> {
        match self {
            Self::Categorized(categories) => categories
                .into_iter()
                .flat_map(|(category, pairs)| {
                    pairs.into_iter().map(move |(ja, zh)| TerminologyEntry {
                        source_term: zh,
                        target_term: ja,
                        category: category.clone(),
                    })
                })
                .collect(),
            Self::Flat(pairs) => pairs
                .into_iter()
                .map(|(ja, zh)| TerminologyEntry {
                    source_term: zh,
                    target_term: ja,
                    category: default_category(),
                })
                .collect(),
            Self::Entries(entries) => entries,
        }
    }
}

/// 문자열 값만 (키, 값) 쌍으로 추출
fn string_pairs(map: Map<String, Value>) -> Vec<(String, String)> {
    map.into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            _ => None,
        })
        .collect()
}

// ============================================================================
// TerminologyTranslator
// ============================================================================

/// 중일 양방향 용어 번역기
#[derive(Debug, Default)]
pub struct TerminologyTranslator {
    /// 중국어 → 일본어
    forward: HashMap<String, String>,
    /// 일본어 → 중국어
    backward: HashMap<String, String>,
    forward_trie: TermTrie,
    backward_trie: TermTrie,
}

impl TerminologyTranslator {
    /// 빈 번역기 (치환 없음)
    pub fn empty() -> Self {
        Self::default()
    }

    /// 용어 항목으로 생성
    ///
    /// 같은 키가 여러 번 나오면 나중 항목이 이깁니다 (방향별로 각각).
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = TerminologyEntry>,
    {
        let mut forward = HashMap::new();
        let mut backward = HashMap::new();

        for entry in entries {
            let source = entry.source_term.trim();
            let target = entry.target_term.trim();
            if source.is_empty() || target.is_empty() {
                continue;
            }
            forward.insert(source.to_string(), target.to_string());
            backward.insert(target.to_string(), source.to_string());
        }

        let forward_trie = TermTrie::from_map(&forward);
        let backward_trie = TermTrie::from_map(&backward);

        Self {
            forward,
            backward,
            forward_trie,
            backward_trie,
        }
    }

    /// JSON 문자열 하나로 생성
    pub fn from_json_str(json: &str) -> Result<Self, GlossaryError> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::from_entries(GlossaryShape::classify(value)?.into_entries()))
    }

    /// 용어집 파일들을 순서대로 로드 (뒤 파일이 앞 파일을 덮어씀)
    ///
    /// 존재하지 않는 파일은 건너뛰고, 파싱 실패는 에러로 반환합니다.
    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut entries = Vec::new();

        for path in paths {
            if !path.exists() {
                tracing::warn!("Glossary file not found, skipping: {:?}", path);
                continue;
            }
            entries.extend(read_glossary_file(path)?);
        }

        let translator = Self::from_entries(entries);
        tracing::info!(
            "Terminology loaded: {} zh→ja, {} ja→zh",
            translator.forward.len(),
            translator.backward.len()
        );
        Ok(translator)
    }

    /// 중국어 → 일본어 용어 수
    pub fn forward_len(&self) -> usize {
        self.forward.len()
    }

    /// 일본어 → 중국어 용어 수
    pub fn backward_len(&self) -> usize {
        self.backward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.backward.is_empty()
    }

    /// 질문 속 중국어 용어를 일본어로 치환
    pub fn translate_query(&self, query: &str) -> (String, Vec<TermSubstitution>) {
        self.forward_trie.replace_all(query)
    }

    /// 질의 확장
    ///
    /// 치환이 하나라도 있으면 `"{원문} {변환문}"`, 없으면 원문 그대로.
    pub fn expand_query(&self, query: &str) -> String {
        let (translated, substitutions) = self.translate_query(query);
        if substitutions.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", query, translated)
        }
    }

    /// 검색 결과 텍스트의 일본어 용어를 중국어로 치환
    pub fn translate_result(&self, text: &str) -> String {
        self.backward_trie.replace_all(text).0
    }
}

/// 용어집 파일 하나 읽기
fn read_glossary_file(path: &Path) -> Result<Vec<TerminologyEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read glossary: {:?}", path))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse glossary JSON: {:?}", path))?;
    let shape = GlossaryShape::classify(value)
        .with_context(|| format!("Unsupported glossary layout: {:?}", path))?;
    Ok(shape.into_entries())
}

// ============================================================================
// Tests
// ============================================================================
