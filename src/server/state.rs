//! 웹 서버 공유 상태
//!
//! 설정, 세션 저장소, 임베딩/LLM 프로바이더를 핸들러 간에 공유하고
//! 업로드 → 추출 → (인덱싱) 파이프라인을 조율합니다.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::AppConfig;
use crate::embedding::{EmbeddingProvider, OllamaEmbedding};
use crate::error::Result;
use crate::extractor::extract_upload;
use crate::generation::{LanguageModel, OllamaGenerator};
use crate::knowledge::{ChunkConfig, RecursiveChunker};
use crate::qa::QaEngine;
use crate::session::{LoadedDocument, SessionStore, SessionSummary};
use crate::upload::UploadedDocument;

/// 핸들러 공유 상태
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    sessions: SessionStore,
    chunker: RecursiveChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
}

impl AppState {
    /// 로컬 Ollama 프로바이더로 생성
    pub fn new(config: AppConfig) -> Result<Self> {
        let embedder = Arc::new(OllamaEmbedding::new(&config.ollama)?);
        let llm = Arc::new(OllamaGenerator::new(&config.ollama)?);
        tracing::info!(
            "Ollama at {} (embed: {}, generate: {})",
            config.ollama.base_url,
            config.ollama.embed_model,
            config.ollama.generate_model
        );
        Self::with_providers(config, embedder, llm)
    }

    /// 임베딩/LLM 프로바이더 지정
    pub fn with_providers(
        config: AppConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        config.validate()?;
        let chunker = RecursiveChunker::new(ChunkConfig::from(&config.chunking))?;
        let sessions = SessionStore::new(config.server.session_ttl());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions,
                chunker,
                embedder,
                llm,
            }),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    /// 업로드된 문서를 세션에 로드
    ///
    /// 추출은 요청 안에서 끝내고, 인덱싱은 백그라운드 작업으로 넘깁니다.
    pub async fn load_document(&self, id: Uuid, upload: UploadedDocument) -> Result<SessionSummary> {
        let generation = self.sessions().begin_upload(&id)?;
        tracing::info!(
            "Session {}: loading {} ({} bytes, sha256 {})",
            id,
            upload.filename,
            upload.size(),
            upload.fingerprint()
        );

        let extracted = extract_upload(&upload).await;
        let doc = self.sessions().finish_extraction(
            &id,
            generation,
            extracted.map(|extracted| LoadedDocument { upload, extracted }),
        )?;

        if self.config().qa.enabled {
            self.spawn_indexing(id, generation, doc);
        } else {
            self.sessions().mark_ready(&id, generation)?;
        }

        self.sessions().summary(&id)
    }

    fn spawn_indexing(&self, id: Uuid, generation: u64, doc: Arc<LoadedDocument>) {
        if self.sessions().begin_indexing(&id, generation).is_err() {
            return;
        }

        let state = self.clone();
        let task = tokio::spawn(async move {
            let text = doc.extracted.plain_text();
            let inner = &state.inner;
            let result = QaEngine::build(
                &text,
                &inner.chunker,
                inner.embedder.clone(),
                inner.llm.clone(),
                inner.config.qa.clone(),
            )
            .await;

            if state.sessions().complete_indexing(&id, generation, result) {
                tracing::info!("Session {}: indexing finished", id);
            }
        });

        self.sessions()
            .attach_indexing(&id, generation, task.abort_handle());
    }
}
