//! 질의응답 파이프라인 (RAG)
//!
//! 문서 텍스트 → 청크 → 임베딩 → 인메모리 인덱스를 한 번 구축하고,
//! 질문마다 top-k 청크를 검색해 LLM에 문맥으로 넘깁니다.
//!
//! ```rust,ignore
//! let engine = QaEngine::build(&text, &chunker, embedder, llm, config.qa.clone()).await?;
//! let answer = engine.ask("Who is the narrator?").await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::QaConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result, Stage};
use crate::generation::{build_qa_prompt, LanguageModel};
use crate::knowledge::{Chunker, MemoryVectorIndex, VectorStore};

// ============================================================================
// Types
// ============================================================================

/// 답변에 인용된 출처 청크
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceChunk {
    /// 검색 순위 (1부터)
    pub rank: usize,
    pub chunk_index: usize,
    /// 코사인 유사도
    pub score: f32,
    /// 표시용으로 잘린 청크 텍스트
    pub text: String,
}

/// 질의응답 결과
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceChunk>,
}

// ============================================================================
// QaEngine
// ============================================================================

/// 문서 하나에 대한 질의응답 엔진
///
/// 업로드마다 새로 만들며, 질문 사이에 대화 기록은 유지하지 않습니다.
pub struct QaEngine {
    index: MemoryVectorIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    config: QaConfig,
}

impl std::fmt::Debug for QaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaEngine")
            .field("chunks", &self.index.count())
            .field("embedder", &self.embedder.name())
            .field("llm", &self.llm.name())
            .finish()
    }
}

impl QaEngine {
    /// 텍스트를 청킹/임베딩해서 인덱스 구축
    ///
    /// 추출 가능한 텍스트가 없으면 임베딩 호출 없이 `EmptyDocument`를 반환합니다.
    pub async fn build(
        text: &str,
        chunker: &dyn Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
        config: QaConfig,
    ) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::EmptyDocument);
        }

        let chunks = chunker.chunk(text);
        if chunks.is_empty() {
            return Err(Error::EmptyDocument);
        }

        tracing::info!(
            "Indexing {} chunks with {} ({})",
            chunks.len(),
            embedder.name(),
            chunker.name()
        );

        let embeddings = with_timeout(
            Stage::Embedding,
            config.index_timeout(),
            embedder.embed_batch(&chunks),
        )
        .await?;

        let index = MemoryVectorIndex::build(chunks, embeddings)?;

        tracing::info!(
            "Index ready: {} chunks, dimension {}",
            index.count(),
            index.dimension()
        );

        Ok(Self {
            index,
            embedder,
            llm,
            config,
        })
    }

    /// 인덱싱된 청크 수
    pub fn chunk_count(&self) -> usize {
        self.index.count()
    }

    /// 질문에 답변
    ///
    /// 질문 임베딩과 답변 생성이 함께 `answer_timeout` 안에 끝나야 합니다.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidRequest("question must not be empty".into()));
        }

        let timeout = self.config.answer_timeout();
        let deadline = Instant::now() + timeout;

        let query = with_deadline(
            Stage::Embedding,
            timeout,
            deadline,
            self.embedder.embed(question),
        )
        .await?;

        let results = self.index.search(&query, self.config.top_k)?;
        tracing::debug!("Retrieved {} chunks for question", results.len());

        let prompt = build_qa_prompt(question, &results);
        let answer = with_deadline(
            Stage::Inference,
            timeout,
            deadline,
            self.llm.generate(&prompt),
        )
        .await?;

        let sources = results
            .into_iter()
            .enumerate()
            .map(|(i, r)| SourceChunk {
                rank: i + 1,
                chunk_index: r.chunk_index,
                score: r.similarity,
                text: truncate_text(&r.chunk_text, self.config.source_preview_chars),
            })
            .collect();

        Ok(Answer { answer, sources })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn with_timeout<T>(
    stage: Stage,
    timeout: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    with_deadline(stage, timeout, Instant::now() + timeout, fut).await
}

async fn with_deadline<T>(
    stage: Stage,
    timeout: Duration,
    deadline: Instant,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} exceeded {:?}", stage, timeout);
            Err(Error::Timeout {
                stage,
                secs: timeout.as_secs(),
            })
        }
    }
}

/// 문자 수 기준으로 자르고 잘렸으면 `...` 추가
fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{ChunkConfig, RecursiveChunker};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOPICS: [&str; 3] = ["whale", "ship", "sea"];

    /// 토픽 단어 등장 횟수를 벡터로 쓰는 임베더
    #[derive(Default)]
    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let lower = text.to_lowercase();
            Ok(TOPICS
                .iter()
                .map(|t| lower.matches(t).count() as f32 + 0.01)
                .collect())
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    /// 받은 프롬프트를 그대로 돌려주는 LLM
    struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn small_chunker() -> RecursiveChunker {
        RecursiveChunker::new(ChunkConfig {
            chunk_size: 60,
            chunk_overlap: 0,
            ..Default::default()
        })
        .unwrap()
    }

    fn text() -> String {
        [
            "The whale surfaced near the whale pod.",
            "The ship creaked as the ship turned.",
            "The sea was calm and the sea was grey.",
        ]
        .join("\n\n")
    }

    #[tokio::test]
    async fn test_empty_text_skips_embedding() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let result = QaEngine::build(
            "  \n ",
            &small_chunker(),
            embedder.clone(),
            Arc::new(EchoModel),
            QaConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(Error::EmptyDocument)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ask_retrieves_relevant_chunk_first() {
        let engine = QaEngine::build(
            &text(),
            &small_chunker(),
            Arc::new(KeywordEmbedder::default()),
            Arc::new(EchoModel),
            QaConfig {
                top_k: 2,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(engine.chunk_count(), 3);

        let answer = engine.ask("What about the ship?").await.unwrap();
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].rank, 1);
        assert!(answer.sources[0].text.contains("ship"));
        assert!(answer.sources[0].score >= answer.sources[1].score);
        assert!(answer.answer.contains("Question: What about the ship?"));
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let engine = QaEngine::build(
            &text(),
            &small_chunker(),
            Arc::new(KeywordEmbedder::default()),
            Arc::new(EchoModel),
            QaConfig::default(),
        )
        .await
        .unwrap();

        assert!(matches!(
            engine.ask("   ").await,
            Err(Error::InvalidRequest(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inference_timeout() {
        let engine = QaEngine::build(
            &text(),
            &small_chunker(),
            Arc::new(KeywordEmbedder::default()),
            Arc::new(SlowModel),
            QaConfig {
                answer_timeout_secs: 5,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = engine.ask("whale?").await.err();
        assert!(matches!(
            err,
            Some(Error::Timeout {
                stage: Stage::Inference,
                secs: 5
            })
        ));
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 300), "short");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("가나다라", 2), "가나...");
    }
}
