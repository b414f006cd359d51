//! Knowledge 모듈 - 문서 하나에 대한 검색 인덱스
//!
//! - Chunker: 재귀적 문자 분할 (1000자 / 200자 오버랩)
//! - Vector: 인메모리 코사인 유사도 검색

mod chunker;
mod vector;

// Re-exports
pub use chunker::{ChunkConfig, Chunker, RecursiveChunker, DEFAULT_SEPARATORS};
pub use vector::{cosine_similarity, MemoryVectorIndex, SearchResult, VectorEntry, VectorStore};
