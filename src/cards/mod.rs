//! 카드 코퍼스 - 카드 번호 기준 인메모리 조회 테이블
//!
//! 스크래퍼가 만든 카드 JSON 배열을 시작 시 한 번 읽어서
//! 정규화된 카드 번호로 색인합니다. 벡터 컬렉션보다 먼저 조회됩니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::collector::{FileCollector, FileKind};
use crate::query::canonicalize_card_number;

/// 카드 여러 장을 한 문서로 묶을 때 구분자
pub const CARD_SEPARATOR: &str = "\n\n---\n\n";

// ============================================================================
// CardRecord
// ============================================================================

/// 카드 한 장
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    pub card_no: String,
    /// 현지어(중국어/일본어 원문) 카드명
    #[serde(rename = "card_name", alias = "name_local", default)]
    pub name_local: String,
    /// 다른 언어 카드명 (중문판 데이터의 일본어명 등)
    #[serde(alias = "name_jp", alias = "card_name_jp", default)]
    pub name_foreign: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub color2: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub level: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cost: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub dp: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub digivolve_cost1: Option<i64>,
    #[serde(default)]
    pub digivolve_color1: Option<String>,
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub digimon_type: Option<String>,
    #[serde(default)]
    pub effect: Option<String>,
    #[serde(default)]
    pub inherited_effect: Option<String>,
    #[serde(default)]
    pub security_effect: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub pack_name: Option<String>,
    /// 이화(패럴렐) 버전 ID
    #[serde(default)]
    pub parallel_id: Option<String>,
}

/// 숫자 또는 숫자 문자열을 허용 ("-", "" 등은 None)
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl CardRecord {
    /// 표시용 제목 (현지어명, 없으면 다른 언어명)
    pub fn title(&self) -> String {
        if !self.name_local.is_empty() {
            self.name_local.clone()
        } else {
            self.name_foreign.clone().unwrap_or_default()
        }
    }

    /// 정규화된 카드 번호 (패턴에 맞지 않으면 대문자 원문)
    pub fn canonical_no(&self) -> String {
        let raw = self.card_no.trim();
        canonicalize_card_number(raw).unwrap_or_else(|| raw.to_ascii_uppercase())
    }

    /// 임베딩/표시용 텍스트
    ///
    /// 첫 줄은 항상 `【카드번호】카드명` - 정확 매칭 검색이 이 마커에 의존합니다.
    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("【{}】{}", self.canonical_no(), self.title()));
        if let Some(card_type) = non_empty(&self.card_type) {
            lines.push(format!("卡牌类型: {}", card_type));
        }

        if let Some(color) = non_empty(&self.color) {
            match non_empty(&self.color2) {
                Some(color2) if color2 != color => lines.push(format!("颜色: {}/{}", color, color2)),
                _ => lines.push(format!("颜色: {}", color)),
            }
        }

        if let Some(level) = self.level {
            lines.push(format!("等级: Lv.{}", level));
        }
        if let Some(cost) = self.cost {
            lines.push(format!("费用: {}", cost));
        }
        if let Some(dp) = self.dp {
            lines.push(format!("DP: {}", dp));
        }
        if let (Some(cost), Some(color)) = (self.digivolve_cost1, non_empty(&self.digivolve_color1)) {
            lines.push(format!("进化费用: {} (从{})", cost, color));
        }

        let labelled = [
            ("形态", &self.form),
            ("属性", &self.attribute),
            ("类型", &self.digimon_type),
            ("效果", &self.effect),
        ];
        for (label, value) in labelled {
            if let Some(v) = non_empty(value) {
                lines.push(format!("{}: {}", label, v));
            }
        }

        if let Some(inherited) = non_empty(&self.inherited_effect) {
            if non_empty(&self.effect) != Some(inherited) {
                lines.push(format!("进化源效果: {}", inherited));
            }
        }
        if let Some(security) = non_empty(&self.security_effect) {
            lines.push(format!("安防效果: {}", security));
        }
        if let Some(rarity) = non_empty(&self.rarity) {
            lines.push(format!("稀有度: {}", rarity));
        }
        if let Some(pack) = non_empty(&self.pack_name) {
            lines.push(format!("卡包: {}", pack));
        }

        lines.join("\n")
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// 카드 목록을 하나의 텍스트로 (카드 컬렉션 수집용)
pub fn format_card_list(cards: &[CardRecord]) -> String {
    cards
        .iter()
        .map(CardRecord::to_text)
        .collect::<Vec<_>>()
        .join(CARD_SEPARATOR)
}

// ============================================================================
// CardCorpus
// ============================================================================

/// 카드 번호 → 카드 목록 (이화 버전이 여러 장일 수 있음)
#[derive(Debug, Default)]
pub struct CardCorpus {
    by_number: HashMap<String, Vec<CardRecord>>,
    total: usize,
}

impl CardCorpus {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 카드 목록으로 생성 (카드 번호는 정규화해서 색인)
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = CardRecord>,
    {
        let mut corpus = Self::default();
        for mut card in records {
            if card.card_no.trim().is_empty() {
                tracing::warn!("Skipping card without card_no: {:?}", card.name_local);
                continue;
            }
            let canonical = card.canonical_no();
            card.card_no = canonical.clone();
            corpus.by_number.entry(canonical).or_default().push(card);
            corpus.total += 1;
        }
        corpus
    }

    /// JSON 배열 문자열에서 생성
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self::from_records(parse_card_array(json)?))
    }

    /// 파일 또는 디렉토리(하위 *.json 전부)에서 로드
    ///
    /// 경로가 없으면 빈 코퍼스. 카드 배열이 아닌 JSON 파일은 건너뜁니다.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Card corpus path not found: {:?}", path);
            return Ok(Self::empty());
        }

        let files: Vec<PathBuf> = if path.is_dir() {
            FileCollector::with_defaults()
                .collect_directory(path)
                .with_context(|| format!("Failed to read card directory: {:?}", path))?
                .into_iter()
                .filter(|f| f.kind == FileKind::Json)
                .map(|f| f.path)
                .collect()
        } else {
            vec![path.to_path_buf()]
        };

        let mut records = Vec::new();
        for file in &files {
            let raw = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read card file: {:?}", file))?;
            match parse_card_array(&raw) {
                Ok(cards) => records.extend(cards),
                Err(e) => tracing::warn!("Skipping card file {:?}: {}", file, e),
            }
        }

        let corpus = Self::from_records(records);
        tracing::info!(
            "Card corpus loaded: {} cards ({} numbers) from {} files",
            corpus.total,
            corpus.by_number.len(),
            files.len()
        );
        Ok(corpus)
    }

    /// 정규화된 카드 번호로 조회
    pub fn lookup(&self, card_no: &str) -> &[CardRecord] {
        let key = canonicalize_card_number(card_no).unwrap_or_else(|| card_no.trim().to_ascii_uppercase());
        self.by_number.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 카드 총 장수
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// 카드 배열 JSON 파싱
///
/// 개별 카드 파싱 실패는 건너뛰고, 배열이 아니면 에러.
pub fn parse_card_array(json: &str) -> Result<Vec<CardRecord>> {
    let value: Value = serde_json::from_str(json).context("Failed to parse card JSON")?;
    let items = match value {
        Value::Array(items) => items,
        _ => anyhow::bail!("Card corpus must be a JSON array"),
    };

    let mut cards = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<CardRecord>(item) {
            Ok(card) => cards.push(card),
            Err(e) => tracing::warn!("Skipping malformed card record #{}: {}", i, e),
        }
    }
    Ok(cards)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"[
        {"card_no": "BT20-079", "card_name": "ウォーグレイモン", "card_type": "デジモン",
         "color": "赤", "level": 6, "cost": "12", "dp": 12000,
         "effect": "【進化時】相手のデジモン1体を消滅させる。", "security_effect": ""},
        {"card_no": "bt20079", "card_name": "ウォーグレイモン", "parallel_id": "P1"},
        {"card_no": "P-001", "card_name": "アグモン", "level": "-"},
        {"card_name": "no number"}
    ]"#;

    #[test]
    fn test_corpus_indexes_canonical_numbers() {
        let corpus = CardCorpus::from_json_str(SAMPLE).unwrap();
        // card_no 없는 레코드는 역직렬화 실패로 제외
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.lookup("BT20079").len(), 2);
        assert_eq!(corpus.lookup("p001").len(), 1);
        assert!(corpus.lookup("EX1-001").is_empty());
    }

    #[test]
    fn test_lenient_numbers() {
        let corpus = CardCorpus::from_json_str(SAMPLE).unwrap();
        let war = &corpus.lookup("BT20-079")[0];
        assert_eq!(war.cost, Some(12));
        assert_eq!(war.dp, Some(12000));
        assert_eq!(corpus.lookup("P-001")[0].level, None);
    }

    #[test]
    fn test_card_text_starts_with_marker() {
        let corpus = CardCorpus::from_json_str(SAMPLE).unwrap();
        let text = corpus.lookup("BT20-079")[0].to_text();
        assert!(text.starts_with("【BT20-079】ウォーグレイモン"));
        assert!(text.contains("等级: Lv.6"));
        assert!(text.contains("费用: 12"));
        // 빈 안방 효과는 출력하지 않음
        assert!(!text.contains("安防效果"));
    }

    #[test]
    fn test_card_text_uses_canonical_number() {
        let card = CardRecord {
            card_no: "bt01-001".to_string(),
            name_local: "滚球兽".to_string(),
            ..Default::default()
        };
        assert_eq!(card.canonical_no(), "BT1-001");
        assert_eq!(card.to_text(), "【BT1-001】滚球兽");
    }

    #[test]
    fn test_format_card_list() {
        let cards = parse_card_array(SAMPLE).unwrap();
        let text = format_card_list(&cards[..2]);
        assert_eq!(text.matches(CARD_SEPARATOR).count(), 1);
    }

    #[test]
    fn test_load_directory_and_missing_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bt20.json"), SAMPLE).unwrap();
        std::fs::write(dir.path().join("terms.json"), r#"{"not": "cards"}"#).unwrap();

        let corpus = CardCorpus::load(dir.path()).unwrap();
        assert_eq!(corpus.len(), 3);

        // 하위 폴더의 JSON도 수집, 숨김 파일과 JSON 아닌 파일은 제외
        let nested = dir.path().join("ex");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(
            nested.join("ex1.json"),
            r#"[{"card_no": "EX01-001", "card_name": "滚球兽"}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join(".draft.json"), SAMPLE).unwrap();
        std::fs::write(dir.path().join("notes.txt"), SAMPLE).unwrap();

        let corpus = CardCorpus::load(dir.path()).unwrap();
        assert_eq!(corpus.len(), 4);
        assert_eq!(corpus.lookup("EX1-001").len(), 1);

        let missing = CardCorpus::load(&dir.path().join("nope")).unwrap();
        assert!(missing.is_empty());
    }
}
