//! Text Chunking Module
//!
//! 구분자 우선순위 기반 재귀 분할을 제공합니다.
//! 문단 → 줄 → 마침표(。) → 세미콜론(；) → 공백 → 문자 단위 순으로 시도하고,
//! 더 굵은 구분자로 충분히 작게 나뉘지 않는 조각만 다음 구분자로 내려갑니다.
//! 길이는 모두 문자(char) 단위입니다.

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 기본 구분자 (우선순위 순, 마지막 빈 문자열은 문자 단위 강제 분할)
pub const DEFAULT_SEPARATORS: [&str; 6] = ["\n\n", "\n", "。", "；", " ", ""];

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 오버랩 크기 (문자 수)
    pub chunk_overlap: usize,
    /// 구분자 우선순위
    pub separators: Vec<String>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ChunkConfig {
    /// 크기/오버랩 지정 (구분자는 기본값)
    pub fn with_size(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 재귀 구분자 청커
///
/// - 모든 청크는 `chunk_size` 문자 이하
/// - 청크 순서는 원문 순서
/// - 인접 청크는 최대 `chunk_overlap` 문자를 공유
pub struct RecursiveChunker {
    config: ChunkConfig,
}

impl RecursiveChunker {
    /// 설정으로 생성
    pub fn new(mut config: ChunkConfig) -> Self {
        config.chunk_size = config.chunk_size.max(1);
        config.chunk_overlap = config.chunk_overlap.min(config.chunk_size - 1);
        if config.separators.last().map(|s| !s.is_empty()).unwrap_or(true) {
            // 항상 종료하도록 문자 단위 분할을 보장
            config.separators.push(String::new());
        }
        Self { config }
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // 본문에 등장하는 첫 구분자 선택
        let mut separator = "";
        let mut rest: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.as_str();
                rest = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.config.chunk_size {
                small.push(piece);
                continue;
            }

            if !small.is_empty() {
                chunks.extend(self.merge_pieces(&small));
                small.clear();
            }
            if rest.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, rest));
            }
        }

        if !small.is_empty() {
            chunks.extend(self.merge_pieces(&small));
        }

        chunks
    }

    /// 작은 조각들을 크기 한도까지 이어 붙이고, 다음 청크는 오버랩만큼 되돌아가서 시작
    fn merge_pieces(&self, pieces: &[String]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut merged = Vec::new();
        let mut window: std::collections::VecDeque<(&str, usize)> = Default::default();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > size && !window.is_empty() {
                push_trimmed(&mut merged, window.iter().map(|(s, _)| *s));

                while total > overlap || (total + len > size && total > 0) {
                    match window.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }

            window.push_back((piece.as_str(), len));
            total += len;
        }

        push_trimmed(&mut merged, window.iter().map(|(s, _)| *s));
        merged
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut chunks = self.split_recursive(text, &self.config.separators);
        chunks.retain(|c| !c.trim().is_empty());
        chunks
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 구분자로 나누되, 구분자는 앞 조각 끝에 남겨 둠 (문장부호가 문장과 함께 이동)
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, sep) in text.match_indices(separator) {
        let end = idx + sep.len();
        pieces.push(text[start..end].to_string());
        start = end;
    }
    if start < text.len() {
        pieces.push(text[start..].to_string());
    }
    pieces
}

fn push_trimmed<'a>(out: &mut Vec<String>, parts: impl Iterator<Item = &'a str>) {
    let joined: String = parts.collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성 (500자 / 오버랩 100자)
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(RecursiveChunker::with_defaults())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_empty() {
        let chunker = RecursiveChunker::with_defaults();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("  \n\n ").is_empty());
    }

    #[test]
    fn test_chunker_small_text() {
        let chunker = RecursiveChunker::with_defaults();
        let chunks = chunker.chunk("  6.1 进化：支付进化费用后重叠到数码宝贝上。 ");
        assert_eq!(chunks, vec!["6.1 进化：支付进化费用后重叠到数码宝贝上。"]);
    }

    #[test]
    fn test_chunker_prefers_paragraphs() {
        let chunker = RecursiveChunker::with_defaults();
        let p1 = "甲".repeat(300);
        let p2 = "乙".repeat(300);
        let chunks = chunker.chunk(&format!("{}\n\n{}", p1, p2));

        assert_eq!(chunks, vec![p1, p2]);
    }

    #[test]
    fn test_chunker_hard_cut_without_separators() {
        let chunker = RecursiveChunker::with_defaults();
        let text = "规".repeat(1200);
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(char_len(&chunks[0]), 500);
        assert_eq!(char_len(&chunks[1]), 500);
        assert_eq!(char_len(&chunks[2]), 400);
    }

    #[test]
    fn test_chunker_sentences_overlap_and_order() {
        let chunker = RecursiveChunker::new(ChunkConfig::with_size(40, 12));
        let sentences: Vec<String> = (0..12).map(|i| format!("第{:02}条规则说明。", i)).collect();
        let text = sentences.concat();
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 40);
        }
        // 순서 유지 + 인접 청크 간 문장 공유
        assert!(chunks[0].starts_with("第00条"));
        assert!(chunks.last().unwrap().ends_with("第11条规则说明。"));
        let last_of_first = chunks[0].rsplit("第").next().unwrap();
        assert!(chunks[1].contains(last_of_first));
    }

    #[test]
    fn test_split_keeping_separator() {
        let pieces = split_keeping_separator("a\n\nb\n\nc", "\n\n");
        assert_eq!(pieces, vec!["a\n\n", "b\n\n", "c"]);

        let pieces = split_keeping_separator("甲。乙。", "。");
        assert_eq!(pieces, vec!["甲。", "乙。"]);
    }

    #[test]
    fn test_config_clamped() {
        let chunker = RecursiveChunker::new(ChunkConfig {
            chunk_size: 0,
            chunk_overlap: 10,
            separators: vec!["\n".to_string()],
        });
        assert_eq!(chunker.config.chunk_size, 1);
        assert_eq!(chunker.config.chunk_overlap, 0);
        assert_eq!(chunker.config.separators.last().unwrap(), "");
        assert_eq!(chunker.chunk("ab").len(), 2);
    }
}
