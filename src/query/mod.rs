//! 질의 전처리 모듈 - 카드 번호 / 수치 힌트 추출
//!
//! 자유 텍스트 질문(중국어, 일본어, 카드 번호가 섞여 있음)에서
//! 구조화된 엔티티를 뽑아냅니다. 매칭 실패는 에러가 아니라 빈 결과입니다.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

// ============================================================================
// Patterns
// ============================================================================

/// 카드 번호 패턴
///
/// - 부스터 계열 (하이픈 있음): `BT20-079`, `BT-20-079`, `EX1-001`, `ST1-01`, `RB1-001`
/// - 부스터 계열 (하이픈 없음): `BT20079`, `EX1001`, `ST101` → [`split_set_digits`]
/// - 프로모 계열: `P-001`, `P001`, `LM-01`
///
/// 한자/가나가 바로 붙어 있어도 잡아야 하므로 `\b`를 쓰지 않고,
/// 앞뒤 경계는 [`is_bounded`]에서 따로 검사합니다.
const CARD_NO_PATTERN: &str =
    r"(?i)(BT|EX|ST|RB)-?(\d{1,2})-(\d{2,3})|(BT|EX|ST|RB)-?(\d{3,5})|(P|LM)-?(\d{2,3})";

static CARD_NO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CARD_NO_PATTERN).expect("card number pattern is valid"));

static CARD_NO_EXACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^(?:{})$", CARD_NO_PATTERN)).expect("card number pattern is valid")
});

/// 메모리(코스트) 패턴: "3内存", "5 メモリー", "费用: 4", "コスト5"
static MEMORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+)\s*(?:内存|メモリー|メモリ|memory)|(?:登场费用|费用|コスト|cost)\s*[:：]?\s*(\d+)",
    )
    .expect("memory pattern is valid")
});

/// 레벨 패턴: "Lv.6", "等级 5", "レベル4"
static LEVEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Lv\.?|等级|レベル|level)\s*[:：]?\s*(\d+)").expect("level pattern is valid")
});

// ============================================================================
// Types
// ============================================================================

/// 수치 힌트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HintKind {
    /// 등장/진화 코스트 (메모리)
    Memory,
    /// 레벨
    Level,
}

/// 질문에서 뽑은 수치 힌트
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NumericHint {
    pub kind: HintKind,
    pub value: u32,
}

/// 질문 한 건에서 추출한 엔티티 (요청 단위로 생성 후 폐기)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryEntity {
    /// 원본 질문
    pub original: String,
    /// 정규화된 카드 번호 (등장 순서 유지, 중복 유지)
    pub card_numbers: Vec<String>,
    /// 수치 힌트 (등장 순서)
    pub numeric_hints: Vec<NumericHint>,
}

impl QueryEntity {
    /// 메모리 값 목록
    pub fn memory_values(&self) -> Vec<u32> {
        self.hint_values(HintKind::Memory)
    }

    /// 레벨 목록
    pub fn levels(&self) -> Vec<u32> {
        self.hint_values(HintKind::Level)
    }

    /// 서로 다른 카드 번호 개수
    pub fn distinct_card_count(&self) -> usize {
        let mut seen: Vec<&str> = Vec::with_capacity(self.card_numbers.len());
        for no in &self.card_numbers {
            if !seen.contains(&no.as_str()) {
                seen.push(no);
            }
        }
        seen.len()
    }

    fn hint_values(&self, kind: HintKind) -> Vec<u32> {
        self.numeric_hints
            .iter()
            .filter(|h| h.kind == kind)
            .map(|h| h.value)
            .collect()
    }
}

/// 검색 계획 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// 카드 번호 정확 매칭
    Card,
    /// 규칙 시맨틱 검색
    Rule,
}

/// 검색 계획 한 건
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSearch {
    pub text: String,
    pub kind: SearchKind,
}

// ============================================================================
// QueryProcessor
// ============================================================================

/// 질의 전처리기
#[derive(Debug, Clone, Default)]
pub struct QueryProcessor;

impl QueryProcessor {
    pub fn new() -> Self {
        Self
    }

    /// 질문에서 카드 번호를 모두 추출
    ///
    /// 대문자화 후 `{세트코드}{세트번호}-{카드번호}` 형태로 정규화합니다.
    /// 원문 등장 순서를 유지하며 중복은 제거하지 않습니다.
    pub fn extract_card_numbers(&self, query: &str) -> Vec<String> {
        CARD_NO_RE
            .captures_iter(query)
            .filter(|caps| {
                caps.get(0)
                    .map(|m| is_bounded(query, m.start(), m.end()))
                    .unwrap_or(false)
            })
            .filter_map(|caps| canonical_from_captures(&caps))
            .collect()
    }

    /// 메모리/레벨 수치 힌트 추출 (등장 위치 순)
    pub fn extract_numeric_hints(&self, query: &str) -> Vec<NumericHint> {
        let mut hints: Vec<(usize, NumericHint)> = Vec::new();

        for caps in MEMORY_RE.captures_iter(query) {
            let value = caps.get(1).or_else(|| caps.get(2));
            if let Some(value) = value.and_then(|m| m.as_str().parse::<u32>().ok()) {
                let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
                hints.push((start, NumericHint { kind: HintKind::Memory, value }));
            }
        }

        for caps in LEVEL_RE.captures_iter(query) {
            if let Some(value) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
                let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
                hints.push((start, NumericHint { kind: HintKind::Level, value }));
            }
        }

        hints.sort_by_key(|(pos, _)| *pos);
        hints.into_iter().map(|(_, hint)| hint).collect()
    }

    /// 메모리 값만 추출
    pub fn extract_memory_values(&self, query: &str) -> Vec<u32> {
        self.extract_numeric_hints(query)
            .into_iter()
            .filter(|h| h.kind == HintKind::Memory)
            .map(|h| h.value)
            .collect()
    }

    /// 레벨만 추출
    pub fn extract_levels(&self, query: &str) -> Vec<u32> {
        self.extract_numeric_hints(query)
            .into_iter()
            .filter(|h| h.kind == HintKind::Level)
            .map(|h| h.value)
            .collect()
    }

    /// 질문 분석 (카드 번호 + 수치 힌트)
    pub fn analyze(&self, query: &str) -> QueryEntity {
        QueryEntity {
            original: query.to_string(),
            card_numbers: self.extract_card_numbers(query),
            numeric_hints: self.extract_numeric_hints(query),
        }
    }

    /// 검색 계획 생성
    ///
    /// 카드 번호마다 정확 매칭 검색 1건, 마지막에 질문 전체로 규칙 검색 1건.
    pub fn build_search_queries(&self, query: &str) -> Vec<PlannedSearch> {
        let mut plan: Vec<PlannedSearch> = self
            .extract_card_numbers(query)
            .into_iter()
            .map(|no| PlannedSearch {
                text: no,
                kind: SearchKind::Card,
            })
            .collect();

        plan.push(PlannedSearch {
            text: query.to_string(),
            kind: SearchKind::Rule,
        });

        plan
    }
}

// ============================================================================
// Canonicalization
// ============================================================================

/// 카드 번호 한 개를 정규형으로 변환
///
/// 카드 번호 전체가 패턴과 일치하지 않으면 `None`.
/// `canonicalize_card_number(canonicalize_card_number(x)) == canonicalize_card_number(x)`.
pub fn canonicalize_card_number(raw: &str) -> Option<String> {
    let caps = CARD_NO_EXACT_RE.captures(raw.trim())?;
    canonical_from_captures(&caps)
}

fn canonical_from_captures(caps: &Captures<'_>) -> Option<String> {
    if let (Some(code), Some(set), Some(num)) = (caps.get(1), caps.get(2), caps.get(3)) {
        return Some(format_booster(code.as_str(), set.as_str(), num.as_str()));
    }

    if let (Some(code), Some(digits)) = (caps.get(4), caps.get(5)) {
        let (set, num) = split_set_digits(code.as_str(), digits.as_str())?;
        return Some(format_booster(code.as_str(), set, num));
    }

    if let (Some(code), Some(num)) = (caps.get(6), caps.get(7)) {
        return Some(format!("{}-{}", code.as_str().to_ascii_uppercase(), num.as_str()));
    }

    None
}

fn format_booster(code: &str, set: &str, num: &str) -> String {
    let set = set.trim_start_matches('0');
    let set = if set.is_empty() { "0" } else { set };
    format!("{}{}-{}", code.to_ascii_uppercase(), set, num)
}

/// 하이픈 없는 숫자열을 (세트 번호, 카드 번호)로 분리
///
/// ST 계열은 카드 번호가 2자리, 나머지는 3자리를 우선합니다.
fn split_set_digits<'a>(code: &str, digits: &'a str) -> Option<(&'a str, &'a str)> {
    let card_width = match (code.eq_ignore_ascii_case("ST"), digits.len()) {
        (true, 3 | 4) => 2,
        (true, _) => return None,
        (false, 3) => 2,
        (false, 4 | 5) => 3,
        (false, _) => return None,
    };
    Some(digits.split_at(digits.len() - card_width))
}

/// 매치 앞은 영문자가 아니고, 뒤는 숫자가 아니어야 함 (`DP12000` 같은 오탐 방지)
fn is_bounded(text: &str, start: usize, end: usize) -> bool {
    let before_ok = text[..start]
        .chars()
        .next_back()
        .map(|c| !c.is_ascii_alphabetic())
        .unwrap_or(true);
    let after_ok = text[end..]
        .chars()
        .next()
        .map(|c| !c.is_ascii_digit())
        .unwrap_or(true);
    before_ok && after_ok
}

// ============================================================================
// Tests
// ============================================================================
