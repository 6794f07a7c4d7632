//! 용어 트라이 - 최장 일치 우선 치환
//!
//! 왼쪽부터 한 번 훑으며 치환하는 방식이 아닙니다.
//! 먼저 원문 전체에서 모든 용어 후보를 모은 뒤, 텍스트 전체 기준으로
//! 긴 용어부터 (길이가 같으면 앞쪽부터) 겹치지 않게 채택하고 한 번에 치환합니다.
//! 그래서 뒤쪽의 긴 용어가 앞쪽의 짧은 용어보다 먼저 자리를 차지할 수 있습니다.
//! 치환 결과를 다시 치환하지 않으므로 번역문이 재번역되어 깨지는 일이 없습니다.

use std::collections::HashMap;

// ============================================================================
// Types
// ============================================================================

/// 치환 기록 (원문 용어, 번역 용어)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermSubstitution {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Default)]
struct Node {
    children: HashMap<char, usize>,
    /// 이 노드에서 끝나는 용어의 replacements 인덱스
    terminal: Option<usize>,
}

/// 문자 단위 트라이
#[derive(Debug)]
pub struct TermTrie {
    nodes: Vec<Node>,
    replacements: Vec<(String, String)>,
}

impl Default for TermTrie {
    fn default() -> Self {
        Self {
            nodes: vec![Node::default()],
            replacements: Vec::new(),
        }
    }
}

/// 후보 매치 (시작 위치, 길이, 용어 인덱스)
#[derive(Debug, Clone, Copy)]
struct Candidate {
    start: usize,
    len: usize,
    term: usize,
}

impl TermTrie {
    /// 사전으로 트라이 생성
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let mut trie = Self::default();
        // 같은 입력에 같은 결과가 나오도록 키 정렬
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        for key in keys {
            if let Some(value) = map.get(key) {
                trie.insert(key, value);
            }
        }
        trie
    }

    fn insert(&mut self, key: &str, value: &str) {
        if key.is_empty() {
            return;
        }

        let mut node = 0;
        for ch in key.chars() {
            node = match self.nodes[node].children.get(&ch) {
                Some(&next) => next,
                None => {
                    self.nodes.push(Node::default());
                    let next = self.nodes.len() - 1;
                    self.nodes[node].children.insert(ch, next);
                    next
                }
            };
        }

        match self.nodes[node].terminal {
            Some(idx) => self.replacements[idx].1 = value.to_string(),
            None => {
                self.replacements.push((key.to_string(), value.to_string()));
                self.nodes[node].terminal = Some(self.replacements.len() - 1);
            }
        }
    }

    /// 등록된 용어 수
    pub fn len(&self) -> usize {
        self.replacements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    /// 텍스트 전체 치환
    ///
    /// 채택 순서: 긴 용어 우선, 길이가 같으면 앞쪽 우선.
    pub fn replace_all(&self, text: &str) -> (String, Vec<TermSubstitution>) {
        if self.is_empty() || text.is_empty() {
            return (text.to_string(), Vec::new());
        }

        let chars: Vec<char> = text.chars().collect();
        let mut candidates = self.collect_candidates(&chars);
        if candidates.is_empty() {
            return (text.to_string(), Vec::new());
        }

        candidates.sort_by(|a, b| b.len.cmp(&a.len).then(a.start.cmp(&b.start)));

        let mut occupied = vec![false; chars.len()];
        let mut accepted: Vec<Candidate> = Vec::new();
        for cand in candidates {
            let span = cand.start..cand.start + cand.len;
            if occupied[span.clone()].iter().any(|&o| o) {
                continue;
            }
            for slot in &mut occupied[span] {
                *slot = true;
            }
            accepted.push(cand);
        }
        accepted.sort_by_key(|c| c.start);

        let mut out = String::with_capacity(text.len() * 2);
        let mut substitutions = Vec::with_capacity(accepted.len());
        let mut cursor = 0;
        for cand in accepted {
            out.extend(&chars[cursor..cand.start]);
            let (from, to) = &self.replacements[cand.term];
            out.push_str(to);
            substitutions.push(TermSubstitution {
                from: from.clone(),
                to: to.clone(),
            });
            cursor = cand.start + cand.len;
        }
        out.extend(&chars[cursor..]);

        (out, substitutions)
    }

    /// 모든 위치에서 경계 조건을 만족하는 후보 수집
    fn collect_candidates(&self, chars: &[char]) -> Vec<Candidate> {
        let mut found = Vec::new();

        for start in 0..chars.len() {
            let mut node = 0;
            for (offset, ch) in chars[start..].iter().enumerate() {
                node = match self.nodes[node].children.get(ch) {
                    Some(&next) => next,
                    None => break,
                };
                if let Some(term) = self.nodes[node].terminal {
                    let len = offset + 1;
                    if respects_boundary(chars, start, start + len) {
                        found.push(Candidate { start, len, term });
                    }
                }
            }
        }

        found
    }
}

// ============================================================================
// Boundary Rules
// ============================================================================

/// 경계가 필요한 문자 계열
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    /// 영문/숫자 - 단어 경계 필요
    Latin,
    /// 가타카나 - 가타카나 연속 중간에서 시작하면 안 됨 (복합어 뒤쪽 이어짐은 허용)
    Katakana,
    /// 한자, 히라가나, 기호 등 - 경계 검사 없음
    Free,
}

fn script_of(c: char) -> Script {
    if c.is_ascii_alphanumeric() {
        Script::Latin
    } else if matches!(c, '\u{30A1}'..='\u{30FA}' | '\u{30FC}' | '\u{FF66}'..='\u{FF9F}') {
        Script::Katakana
    } else {
        Script::Free
    }
}

/// 매치 `[start, end)`가 같은 계열 문자열 중간에서 잘리지 않았는지 확인
///
/// - 영문/숫자: 앞뒤 모두 단어 경계
/// - 가타카나: 앞쪽만 경계 (`ウォー|グレイモン`은 거부, `セキュリティ|チェック`은 허용)
/// - 한자 등: 띄어쓰기가 없으므로 어디서든 허용
fn respects_boundary(chars: &[char], start: usize, end: usize) -> bool {
    let head = script_of(chars[start]);
    if head != Script::Free && start > 0 && script_of(chars[start - 1]) == head {
        return false;
    }

    let tail = script_of(chars[end - 1]);
    if tail == Script::Latin && end < chars.len() && script_of(chars[end]) == tail {
        return false;
    }

    true
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn trie(pairs: &[(&str, &str)]) -> TermTrie {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TermTrie::from_map(&map)
    }

    #[test]
    fn test_longest_term_wins() {
        let t = trie(&[("暴龙兽", "グレイモン"), ("战斗暴龙兽", "ウォーグレイモン")]);
        let (out, subs) = t.replace_all("战斗暴龙兽的效果");
        assert_eq!(out, "ウォーグレイモン的效果");
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].from, "战斗暴龙兽");
    }

    #[test]
    fn test_no_retranslation_of_output() {
        // "A"→"B", "B"→"C" 순차 치환이면 "C"가 되지만 단일 패스는 "B"
        let t = trie(&[("进化", "進化"), ("進化", "进化源")]);
        let (out, _) = t.replace_all("进化");
        assert_eq!(out, "進化");
    }

    #[test]
    fn test_katakana_boundary() {
        let t = trie(&[("グレイモン", "暴龙兽")]);
        let (out, subs) = t.replace_all("ウォーグレイモンとグレイモン");
        assert_eq!(out, "ウォーグレイモンと暴龙兽");
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn test_katakana_compound_continuation() {
        let t = trie(&[("セキュリティ", "安防")]);
        let (out, subs) = t.replace_all("相手のセキュリティチェックで");
        assert_eq!(out, "相手の安防チェックで");
        assert_eq!(subs.len(), 1);

        // 복합어 뒤쪽 절반은 여전히 치환하지 않음
        let t = trie(&[("チェック", "检查")]);
        assert_eq!(t.replace_all("セキュリティチェック").0, "セキュリティチェック");
    }

    #[test]
    fn test_global_longest_first_selection() {
        // 뒤쪽의 긴 용어가 앞쪽의 짧은 용어보다 먼저 채택됨
        let t = trie(&[("安防", "セキュリティ"), ("防御力", "ガード")]);
        assert_eq!(t.replace_all("安防御力").0, "安ガード");
    }

    #[test]
    fn test_latin_boundary() {
        let t = trie(&[("DP", "战斗力")]);
        let (out, _) = t.replace_all("DP+1000, DPS");
        assert_eq!(out, "战斗力+1000, DPS");
    }

    #[test]
    fn test_empty_inputs() {
        let t = TermTrie::default();
        assert!(t.is_empty());
        let (out, subs) = t.replace_all("随便");
        assert_eq!(out, "随便");
        assert!(subs.is_empty());

        let t = trie(&[("a", "b")]);
        assert_eq!(t.replace_all("").0, "");
    }

    #[test]
    fn test_overlap_prefers_longer_term() {
        let t = trie(&[("安防", "セキュリティ"), ("防御", "ブロック")]);
        // "安防御" → "安防"/"防御" 둘 다 2자, 앞쪽 우선
        let (out, _) = t.replace_all("安防御");
        assert_eq!(out, "セキュリティ御");
    }
}
