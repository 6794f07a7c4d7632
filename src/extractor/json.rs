//! JSON 텍스트 변환
//!
//! 파싱된 JSON을 먼저 모양(`JsonShape`)으로 분류한 뒤 모양별로 렌더링합니다.
//! 카드 목록은 카드 텍스트로, 객체는 항목별로(`EntryShape`) 용어 대조표 형식이 됩니다.

use serde_json::{Map, Value};

use crate::cards::{format_card_list, CardRecord};

// ============================================================================
// Shapes
// ============================================================================

/// 최상위 JSON 모양
#[derive(Debug, Clone, PartialEq)]
pub enum JsonShape {
    /// 첫 원소가 `card_no`를 가진 객체 배열
    CardList(Vec<Value>),
    /// 그 외 배열
    ObjectList(Vec<Value>),
    /// 객체
    Object(Map<String, Value>),
    /// 숫자/문자열/bool/null
    Scalar(Value),
}

/// 객체 항목 하나의 모양
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryShape {
    /// `{"분류": {"원어": "번역", ...}}`
    Category,
    /// `{"원어": "번역"}`
    Pair,
    /// `{"키": [...]}`
    List,
    /// 숫자, bool, null
    Other,
}

impl JsonShape {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                let is_cards = items
                    .first()
                    .and_then(Value::as_object)
                    .map(|first| first.contains_key("card_no"))
                    .unwrap_or(false);
                if is_cards {
                    JsonShape::CardList(items)
                } else {
                    JsonShape::ObjectList(items)
                }
            }
            Value::Object(map) => JsonShape::Object(map),
            other => JsonShape::Scalar(other),
        }
    }
}

impl EntryShape {
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::Object(_) => EntryShape::Category,
            Value::String(_) => EntryShape::Pair,
            Value::Array(_) => EntryShape::List,
            _ => EntryShape::Other,
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// JSON 원문 → 임베딩용 텍스트 (파싱 실패 시 원문 그대로)
pub fn json_to_text(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => render(JsonShape::classify(value)),
        Err(e) => {
            tracing::debug!("Not valid JSON, ingesting raw text: {}", e);
            raw.to_string()
        }
    }
}

pub fn render(shape: JsonShape) -> String {
    match shape {
        JsonShape::CardList(items) => {
            let cards: Vec<CardRecord> = items
                .into_iter()
                .enumerate()
                .filter_map(|(i, item)| match serde_json::from_value::<CardRecord>(item) {
                    Ok(card) => Some(card),
                    Err(e) => {
                        tracing::warn!("Skipping malformed card record #{}: {}", i, e);
                        None
                    }
                })
                .collect();
            format_card_list(&cards)
        }
        JsonShape::ObjectList(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => format!("--- 条目 {} ---\n{}", i + 1, render_object(map)),
                other => scalar_text(other),
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        JsonShape::Object(map) => render_object(&map),
        JsonShape::Scalar(value) => scalar_text(&value),
    }
}

/// 객체 → 용어 대조표 텍스트
pub fn render_object(map: &Map<String, Value>) -> String {
    let mut lines = Vec::new();

    for (key, value) in map {
        match (EntryShape::classify(value), value) {
            (EntryShape::Category, Value::Object(terms)) => {
                lines.push(format!("【{}】术语对照：", key));
                for (orig, trans) in terms {
                    if is_truthy(trans) {
                        lines.push(format!("  {} → {}", orig, scalar_text(trans)));
                    }
                }
                lines.push(String::new());
            }
            (EntryShape::Pair, Value::String(trans)) => {
                if !trans.is_empty() {
                    lines.push(format!("{} → {}", key, trans));
                }
            }
            (EntryShape::List, Value::Array(items)) => {
                lines.push(format!("【{}】：", key));
                for item in items {
                    match item {
                        Value::Object(fields) => {
                            let parts: Vec<String> = fields
                                .iter()
                                .filter(|(_, v)| is_truthy(v))
                                .map(|(k, v)| format!("{}: {}", k, scalar_text(v)))
                                .collect();
                            lines.push(format!("  - {}", parts.join(", ")));
                        }
                        other => lines.push(format!("  - {}", scalar_text(other))),
                    }
                }
                lines.push(String::new());
            }
            _ => {}
        }
    }

    lines.join("\n")
}

/// 문자열은 따옴표 없이, 나머지는 JSON 표기
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_shapes() {
        assert!(matches!(
            JsonShape::classify(json!([{"card_no": "BT1-001"}])),
            JsonShape::CardList(_)
        ));
        assert!(matches!(JsonShape::classify(json!([{"a": "b"}])), JsonShape::ObjectList(_)));
        assert!(matches!(JsonShape::classify(json!([])), JsonShape::ObjectList(_)));
        assert!(matches!(JsonShape::classify(json!({"a": "b"})), JsonShape::Object(_)));
        assert!(matches!(JsonShape::classify(json!(42)), JsonShape::Scalar(_)));

        assert_eq!(EntryShape::classify(&json!({"x": "y"})), EntryShape::Category);
        assert_eq!(EntryShape::classify(&json!("y")), EntryShape::Pair);
        assert_eq!(EntryShape::classify(&json!([1])), EntryShape::List);
        assert_eq!(EntryShape::classify(&json!(null)), EntryShape::Other);
    }

    #[test]
    fn test_category_glossary() {
        let text = json_to_text(r#"{"keyword": {"セキュリティ": "安防", "ブロッカー": ""}}"#);
        assert_eq!(text, "【keyword】术语对照：\n  セキュリティ → 安防\n");
    }

    #[test]
    fn test_pairs_and_lists() {
        let text = json_to_text(
            r#"{"進化": "进化", "空": "", "phases": [{"name": "抽卡", "order": 1, "note": ""}, "主要阶段"]}"#,
        );
        assert!(text.contains("進化 → 进化"));
        assert!(!text.contains("空 →"));
        assert!(text.contains("【phases】：\n  - name: 抽卡, order: 1\n  - 主要阶段"));
    }

    #[test]
    fn test_object_list_entries() {
        let text = json_to_text(r#"[{"a": "甲"}, {"b": "乙"}, "plain"]"#);
        assert_eq!(text, "--- 条目 1 ---\na → 甲\n\n--- 条目 2 ---\nb → 乙\n\nplain");
    }

    #[test]
    fn test_card_list_uses_card_format() {
        let text = json_to_text(
            r#"[{"card_no": "BT1-001", "card_name": "滚球兽", "card_type": "数码蛋"},
                {"card_no": "BT1-010", "card_name": "亚古兽", "card_type": "数码宝贝", "level": 3}]"#,
        );
        let parts: Vec<&str> = text.split("\n\n---\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("【BT1-001】滚球兽"));
        assert!(parts[1].contains("等级: Lv.3"));
    }

    #[test]
    fn test_invalid_json_falls_back_to_raw() {
        let raw = "{ not json 安防";
        assert_eq!(json_to_text(raw), raw);
    }
}
