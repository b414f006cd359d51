//! Vector Index - 인메모리 최근접 이웃 검색
//!
//! 문서 하나의 청크 임베딩을 메모리에 보관하고
//! 코사인 유사도로 top-k 청크를 찾습니다. 업로드마다 새로 만듭니다.

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 청크 인덱스 (0-based)
    pub chunk_index: usize,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// 청크 인덱스
    pub chunk_index: usize,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 코사인 유사도 (-1.0 ~ 1.0)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// 벡터 저장소의 공통 인터페이스
pub trait VectorStore: Send + Sync {
    /// 쿼리 벡터와 가장 유사한 청크 `limit`개
    fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 저장된 벡터 개수
    fn count(&self) -> usize;

    /// 임베딩 차원
    fn dimension(&self) -> usize;
}

// ============================================================================
// MemoryVectorIndex
// ============================================================================

/// 인메모리 벡터 인덱스 (전수 코사인 비교)
#[derive(Debug, Clone)]
pub struct MemoryVectorIndex {
    entries: Vec<VectorEntry>,
    dimension: usize,
}

impl MemoryVectorIndex {
    /// 청크와 임베딩으로 인덱스 구축
    ///
    /// 개수가 다르거나, 비어있거나, 차원이 섞여 있으면 에러입니다.
    pub fn build(chunks: Vec<String>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(Error::Index(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimension = match embeddings.first() {
            Some(first) if !first.is_empty() => first.len(),
            Some(_) => return Err(Error::Index("embedding vectors are empty".into())),
            None => return Err(Error::Index("cannot build an index without chunks".into())),
        };

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (chunk_text, embedding))| {
                if embedding.len() != dimension {
                    return Err(Error::Index(format!(
                        "chunk {} has dimension {}, expected {}",
                        chunk_index,
                        embedding.len(),
                        dimension
                    )));
                }
                Ok(VectorEntry {
                    chunk_index,
                    chunk_text,
                    embedding,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "Built vector index: {} entries, dimension {}",
            entries.len(),
            dimension
        );

        Ok(Self { entries, dimension })
    }
}

impl VectorStore for MemoryVectorIndex {
    fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if query_embedding.len() != self.dimension {
            return Err(Error::Index(format!(
                "query has dimension {}, index has {}",
                query_embedding.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .map(|e| (e.chunk_index, cosine_similarity(query_embedding, &e.embedding)))
            .collect();

        // 점수 내림차순, 동점이면 청크 순서 (결정적)
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(chunk_index, similarity)| SearchResult {
                chunk_index,
                chunk_text: self.entries[chunk_index].chunk_text.clone(),
                similarity,
            })
            .collect())
    }

    fn count(&self) -> usize {
        self.entries.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 두 벡터 간의 코사인 유사도를 계산합니다.
/// 결과는 -1.0 ~ 1.0 범위이며, 길이가 다르거나 영벡터면 0.0입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================
