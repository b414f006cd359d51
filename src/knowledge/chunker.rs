//! Text Chunking Module
//!
//! 재귀적 문자 분할기를 제공합니다.
//! 문단 → 줄 → 단어 → 문자 순으로 자연스러운 경계를 우선하며,
//! 고정 크기 윈도우에 오버랩을 두고 청크를 만듭니다.

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};

/// 기본 분할 구분자 (우선순위 순)
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정 (길이는 문자 수 기준)
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// 최대 청크 크기
    pub chunk_size: usize,
    /// 인접 청크 간 최대 오버랩
    pub chunk_overlap: usize,
    /// 분할 구분자 (앞쪽이 우선)
    pub separators: Vec<String>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&ChunkingConfig> for ChunkConfig {
    fn from(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            ..Default::default()
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

/// 재귀적 문자 분할기
///
/// - 텍스트에 존재하는 첫 번째 구분자로 조각을 나눔 (구분자는 다음 조각 앞에 유지)
/// - 청크 크기보다 작은 조각은 오버랩을 두고 병합
/// - 큰 조각은 다음 구분자로 재귀 분할, 마지막 `""`는 문자 단위 분할
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    config: ChunkConfig,
}

impl RecursiveChunker {
    /// 설정으로 생성 (오버랩 >= 크기면 에러)
    pub fn new(config: ChunkConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".into()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    /// 기본 설정 (1000자 / 200자 오버랩)
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
        }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // 텍스트에 존재하는 첫 구분자 선택
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits = split_keep_separator(text, separator);
        let mut good_splits: Vec<String> = Vec::new();

        for piece in splits {
            if char_len(&piece) < self.config.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// 작은 조각들을 청크 크기 이내로 병합
    ///
    /// 청크를 내보낸 뒤 앞쪽 조각을 버려 남은 길이가 오버랩 이하가 되면
    /// 그 조각들이 다음 청크의 시작이 됩니다.
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut docs = Vec::new();
        let mut current: std::collections::VecDeque<(&str, usize)> =
            std::collections::VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = char_len(piece);

            if total + len > size && !current.is_empty() {
                if let Some(doc) = join_pieces(current.iter().map(|(s, _)| *s)) {
                    docs.push(doc);
                }

                while total > overlap || (total + len > size && total > 0) {
                    match current.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }

            current.push_back((piece.as_str(), len));
            total += len;
        }

        if let Some(doc) = join_pieces(current.iter().map(|(s, _)| *s)) {
            docs.push(doc);
        }

        docs
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }
        self.split_recursive(text, &self.config.separators)
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 문자 수 (바이트 아님)
#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 구분자로 나누되 구분자는 다음 조각 앞에 붙여 유지, 빈 조각 제거
fn split_keep_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut parts = text.split(separator);
    let mut pieces = Vec::new();

    if let Some(first) = parts.next() {
        if !first.is_empty() {
            pieces.push(first.to_string());
        }
    }
    for part in parts {
        pieces.push(format!("{}{}", separator, part));
    }

    pieces
}

/// 조각을 이어붙이고 앞뒤 공백 제거 (비면 None)
fn join_pieces<'a>(pieces: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined: String = pieces.collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> RecursiveChunker {
        RecursiveChunker::new(ChunkConfig {
            chunk_size: size,
            chunk_overlap: overlap,
            ..Default::default()
        })
        .unwrap()
    }

    /// `a`의 끝과 `b`의 시작이 겹치는 최대 길이 (문자 수)
    fn overlap_chars(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        (1..=a.len().min(b.len()))
            .rev()
            .find(|&k| a[a.len() - k..] == b[..k])
            .unwrap_or(0)
    }

    #[test]
    fn test_chunker_empty() {
        let chunker = RecursiveChunker::with_defaults();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\n  ").is_empty());
    }

    #[test]
    fn test_chunker_small_text() {
        let chunker = RecursiveChunker::with_defaults();
        let chunks = chunker.chunk("Short paragraph.\n\nAnother one.");
        assert_eq!(chunks, vec!["Short paragraph.\n\nAnother one."]);
    }

    #[test]
    fn test_invalid_overlap() {
        let result = RecursiveChunker::new(ChunkConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_2500_chars_make_three_chunks() {
        // "w000 " ~ "w499 " = 2500 chars, 토큰이 모두 달라 오버랩 측정이 정확함
        let text: String = (0..500).map(|i| format!("w{:03} ", i)).collect();
        assert_eq!(text.chars().count(), 2500);

        let chunks = RecursiveChunker::with_defaults().chunk(&text);
        assert_eq!(chunks.len(), 3);

        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1000);
        }

        for pair in chunks.windows(2) {
            let overlap = overlap_chars(&pair[0], &pair[1]);
            assert!(overlap > 150, "overlap too small: {}", overlap);
            assert!(overlap <= 200, "overlap too large: {}", overlap);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Lorem ipsum dolor sit amet.\n\n".repeat(120);
        let chunker = RecursiveChunker::with_defaults();
        assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let para_a = "a".repeat(30);
        let para_b = "b".repeat(30);
        let text = format!("{}\n\n{}", para_a, para_b);

        let chunks = chunker(40, 0).chunk(&text);
        assert_eq!(chunks, vec![para_a, para_b]);
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let text = "x".repeat(250);
        let chunks = chunker(100, 20).chunk(&text);

        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert_eq!(chunks[0].chars().count(), 100);
        for pair in chunks.windows(2) {
            assert!(overlap_chars(&pair[0], &pair[1]) <= 100);
        }
        // 오버랩을 제외하면 전체 텍스트를 덮음
        let covered: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert!(covered >= 250);
    }

    #[test]
    fn test_multibyte_lengths_are_chars() {
        let text = "가나다라 ".repeat(300);
        let chunks = chunker(100, 20).chunk(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn test_split_keep_separator() {
        assert_eq!(
            split_keep_separator("a b  c", " "),
            vec!["a", " b", " ", " c"]
        );
        assert_eq!(split_keep_separator("ab", ""), vec!["a", "b"]);
        assert_eq!(split_keep_separator(" lead", " "), vec![" lead"]);
    }

    #[test]
    fn test_from_app_config() {
        let app = ChunkingConfig {
            chunk_size: 500,
            chunk_overlap: 50,
        };
        let config = ChunkConfig::from(&app);
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.separators.len(), 4);
    }
}
