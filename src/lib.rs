//! book-reader - PDF 북 리더
//!
//! PDF를 업로드해 브라우저에서 보고, 페이지별/전체 텍스트를 추출하고,
//! 로컬 Ollama 기반 RAG로 문서에 질문할 수 있습니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod knowledge;
pub mod qa;
pub mod server;
pub mod session;
pub mod upload;

// Re-exports
pub use config::AppConfig;
pub use embedding::{EmbeddingProvider, OllamaEmbedding};
pub use error::{Error, Result, Stage};
pub use extractor::{extract_document, extract_page, ExtractedDocument, PageText, PdfReader};
pub use generation::{LanguageModel, OllamaGenerator};
pub use knowledge::{Chunker, MemoryVectorIndex, RecursiveChunker, SearchResult, VectorStore};
pub use qa::{Answer, QaEngine, SourceChunk};
pub use server::{router, AppState};
pub use session::{IndexStatus, Phase, SessionStore, SessionSummary};
pub use upload::UploadedDocument;
