//! 세션 모듈
//!
//! 브라우저 탭 하나의 문서와 파생 상태(페이지, 인덱스)를 명시적인 `Session`으로 보관합니다.
//!
//! 상태 전이: `Idle → Uploaded → Extracted → (Indexed →) Ready`
//! - 업로드 실패 시 `Failed`, 새 업로드만이 벗어날 수 있음
//! - 새 업로드는 모든 파생 상태를 버리고 진행 중인 인덱싱 작업을 중단
//! - 인덱싱 결과는 세대(generation) 번호가 일치할 때만 반영

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::extractor::ExtractedDocument;
use crate::qa::QaEngine;
use crate::upload::UploadedDocument;

// ============================================================================
// Types
// ============================================================================

/// 세션 진행 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Uploaded,
    Extracted,
    Indexed,
    Ready,
    Failed,
}

impl Phase {
    /// 추출된 문서를 볼 수 있는 단계인지
    pub fn has_document(self) -> bool {
        matches!(self, Phase::Extracted | Phase::Indexed | Phase::Ready)
    }
}

/// 클라이언트에 보여줄 에러 요약
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub kind: &'static str,
    pub message: String,
}

impl From<&Error> for ErrorInfo {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// 인덱싱 작업 상태
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexStatus {
    Pending,
    Failed { error: ErrorInfo },
    Complete { chunks: usize },
}

/// 세션에 로드된 문서 (원본 + 추출 결과)
#[derive(Debug)]
pub struct LoadedDocument {
    pub upload: UploadedDocument,
    pub extracted: ExtractedDocument,
}

/// 문서 요약
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub size_bytes: usize,
    pub sha256: String,
    pub page_count: usize,
    pub pages_with_text: usize,
}

impl From<&LoadedDocument> for DocumentSummary {
    fn from(doc: &LoadedDocument) -> Self {
        Self {
            filename: doc.upload.filename.clone(),
            size_bytes: doc.upload.size(),
            sha256: doc.upload.fingerprint(),
            page_count: doc.extracted.page_count(),
            pages_with_text: doc.extracted.pages_with_text(),
        }
    }
}

/// 세션 요약 (`GET /api/sessions/:id`)
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub phase: Phase,
    pub created_at: DateTime<Utc>,
    pub document: Option<DocumentSummary>,
    pub index: Option<IndexStatus>,
    pub error: Option<ErrorInfo>,
}

// ============================================================================
// Session
// ============================================================================

/// 세션 하나의 상태
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    phase: Phase,
    generation: u64,
    document: Option<Arc<LoadedDocument>>,
    index: Option<IndexStatus>,
    engine: Option<Arc<QaEngine>>,
    error: Option<ErrorInfo>,
    indexing: Option<AbortHandle>,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_seen: now,
            phase: Phase::Idle,
            generation: 0,
            document: None,
            index: None,
            engine: None,
            error: None,
            indexing: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn touch(&mut self) {
        self.last_seen = Utc::now();
    }

    fn transition(&mut self, to: Phase) {
        tracing::debug!("Session {}: {:?} -> {:?}", self.id, self.phase, to);
        self.phase = to;
    }

    fn abort_indexing(&mut self) {
        if let Some(handle) = self.indexing.take() {
            if !handle.is_finished() {
                tracing::info!("Session {}: aborting in-flight indexing", self.id);
            }
            handle.abort();
        }
    }

    /// 모든 파생 상태를 버리고 새 세대 시작
    fn reset(&mut self) -> u64 {
        self.abort_indexing();
        self.document = None;
        self.index = None;
        self.engine = None;
        self.error = None;
        self.generation += 1;
        self.transition(Phase::Idle);
        self.generation
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            phase: self.phase,
            created_at: self.created_at,
            document: self.document.as_deref().map(DocumentSummary::from),
            index: self.index.clone(),
            error: self.error.clone(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.abort_indexing();
    }
}

// ============================================================================
// SessionStore
// ============================================================================

/// 동시 접근 가능한 세션 저장소
///
/// 모든 메서드는 짧게 잠그고 `.await` 너머로 잠금을 들고 있지 않습니다.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<Uuid, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// 새 세션 생성 (만료된 세션 정리 포함)
    pub fn create(&self) -> Uuid {
        let pruned = self.prune_idle();
        if pruned > 0 {
            tracing::info!("Pruned {} idle sessions", pruned);
        }

        let session = Session::new();
        let id = session.id;
        self.sessions.insert(id, session);
        tracing::info!("Created session {} ({} active)", id, self.len());
        id
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// 세션 종료 (진행 중인 인덱싱도 중단)
    pub fn remove(&self, id: &Uuid) -> Result<()> {
        self.sessions
            .remove(id)
            .map(|(id, _)| tracing::info!("Removed session {}", id))
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// TTL보다 오래 사용되지 않은 세션 삭제
    pub fn prune_idle(&self) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;

        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.last_seen > cutoff);
        before.saturating_sub(self.sessions.len())
    }

    /// 세션을 잠그고 `f` 실행 (접근 시각 갱신)
    fn with_session<T>(&self, id: &Uuid, f: impl FnOnce(&mut Session) -> T) -> Result<T> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        session.touch();
        Ok(f(&mut *session))
    }

    pub fn summary(&self, id: &Uuid) -> Result<SessionSummary> {
        self.with_session(id, |s| s.summary())
    }

    pub fn phase(&self, id: &Uuid) -> Result<Phase> {
        self.with_session(id, |s| s.phase())
    }

    /// 추출된 문서 (뷰어/다운로드용)
    pub fn document(&self, id: &Uuid) -> Result<Arc<LoadedDocument>> {
        self.with_session(id, |s| match (&s.document, s.phase) {
            (Some(doc), phase) if phase.has_document() => Ok(doc.clone()),
            (_, Phase::Failed) => Err(Error::NotReady(
                "the last upload failed; upload another PDF".into(),
            )),
            _ => Err(Error::NotReady("upload a PDF first".into())),
        })?
    }

    /// 질의응답 엔진 (인덱싱 완료 후에만)
    pub fn engine(&self, id: &Uuid) -> Result<Arc<QaEngine>> {
        self.with_session(id, |s| match (&s.engine, &s.index) {
            (Some(engine), _) if s.phase == Phase::Ready => Ok(engine.clone()),
            (_, Some(IndexStatus::Pending)) => Err(Error::NotReady(
                "the document is still being indexed".into(),
            )),
            (_, Some(IndexStatus::Failed { error })) => Err(Error::NotReady(format!(
                "question answering is unavailable for this document: {}",
                error.message
            ))),
            _ if s.phase.has_document() => Err(Error::NotReady(
                "question answering is disabled".into(),
            )),
            _ => Err(Error::NotReady("upload a PDF first".into())),
        })?
    }

    /// 새 업로드 시작: 이전 문서/인덱스 폐기 후 세대 번호 반환
    pub fn begin_upload(&self, id: &Uuid) -> Result<u64> {
        self.with_session(id, |s| {
            let generation = s.reset();
            s.transition(Phase::Uploaded);
            generation
        })
    }

    /// 추출 결과 반영
    ///
    /// 치명적 에러면 `Failed`, 요청 단위 에러면 `Idle`로 돌아가고 에러를 그대로 돌려줍니다.
    /// 그 사이 새 업로드가 시작됐다면 결과를 버립니다.
    pub fn finish_extraction(
        &self,
        id: &Uuid,
        generation: u64,
        result: Result<LoadedDocument>,
    ) -> Result<Arc<LoadedDocument>> {
        self.with_session(id, |s| {
            if s.generation != generation {
                return Err(Error::NotReady("superseded by a newer upload".into()));
            }

            match result {
                Ok(doc) => {
                    let doc = Arc::new(doc);
                    s.document = Some(doc.clone());
                    s.transition(Phase::Extracted);
                    Ok(doc)
                }
                Err(e) if e.is_fatal() => {
                    s.error = Some(ErrorInfo::from(&e));
                    s.transition(Phase::Failed);
                    Err(e)
                }
                Err(e) => {
                    s.transition(Phase::Idle);
                    Err(e)
                }
            }
        })?
    }

    /// QA 없이 사용: 추출 직후 `Ready`
    pub fn mark_ready(&self, id: &Uuid, generation: u64) -> Result<()> {
        self.with_session(id, |s| {
            if s.generation == generation && s.phase == Phase::Extracted {
                s.transition(Phase::Ready);
            }
        })
    }

    /// 인덱싱 대기 상태로 표시
    pub fn begin_indexing(&self, id: &Uuid, generation: u64) -> Result<()> {
        self.with_session(id, |s| {
            if s.generation == generation {
                s.index = Some(IndexStatus::Pending);
            }
        })
    }

    /// 인덱싱 작업 핸들 등록 (세대가 바뀌었으면 즉시 중단)
    pub fn attach_indexing(&self, id: &Uuid, generation: u64, handle: AbortHandle) {
        let mut handle = Some(handle);
        let _ = self.with_session(id, |s| {
            if s.generation == generation && s.index == Some(IndexStatus::Pending) {
                s.indexing = handle.take();
            }
        });

        if let Some(orphan) = handle {
            orphan.abort();
        }
    }

    /// 인덱싱 결과 반영. 오래된 세대의 결과면 false
    pub fn complete_indexing(
        &self,
        id: &Uuid,
        generation: u64,
        result: Result<QaEngine>,
    ) -> bool {
        let applied = self.with_session(id, |s| {
            if s.generation != generation {
                return false;
            }

            s.indexing = None;
            match result {
                Ok(engine) => {
                    s.index = Some(IndexStatus::Complete {
                        chunks: engine.chunk_count(),
                    });
                    s.engine = Some(Arc::new(engine));
                    s.transition(Phase::Indexed);
                    s.transition(Phase::Ready);
                }
                Err(e) => {
                    tracing::warn!("Session {}: indexing failed: {}", s.id, e);
                    s.index = Some(IndexStatus::Failed {
                        error: ErrorInfo::from(&e),
                    });
                }
            }
            true
        });

        match applied {
            Ok(true) => true,
            _ => {
                tracing::debug!("Discarded stale indexing result for session {}", id);
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
