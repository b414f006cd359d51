//! 에러 타입
//!
//! 업로드부터 질의응답까지 모든 단계의 실패를 닫힌 열거형으로 표현합니다.
//! 웹 경계에서는 `IntoResponse`로 JSON 에러 본문이 됩니다.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// 크레이트 공용 Result
pub type Result<T> = std::result::Result<T, Error>;

/// 타임아웃이 발생한 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embedding,
    Inference,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Embedding => "embedding",
            Stage::Inference => "inference",
        };
        f.write_str(name)
    }
}

/// book-reader 에러
#[derive(Debug, Error)]
pub enum Error {
    /// PDF가 아니거나 비어있는 업로드
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// 손상되었거나 읽을 수 없는 PDF
    #[error("Error reading PDF '{filename}': {message}")]
    Parse { filename: String, message: String },

    /// 암호로 보호된 PDF
    #[error("'{0}' is password-protected; encrypted PDFs are not supported")]
    Encrypted(String),

    /// 범위를 벗어난 페이지 번호
    #[error("Page {page} is out of range (document has {num_pages} pages)")]
    PageOutOfRange { page: usize, num_pages: usize },

    /// 문서 전체에 추출 가능한 텍스트가 없음
    #[error(
        "No text found in this PDF. It looks like a scanned document; \
         run it through an OCR tool first."
    )]
    EmptyDocument,

    /// 임베딩 서비스 실패
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// LLM 추론 실패
    #[error("Inference failed: {0}")]
    Inference(String),

    /// 벡터 인덱스 구성/검색 실패
    #[error("Vector index error: {0}")]
    Index(String),

    /// 외부 호출 타임아웃
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },

    /// 현재 세션 단계에서 허용되지 않는 작업
    #[error("Not ready: {0}")]
    NotReady(String),

    /// 알 수 없는 세션
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// 잘못된 요청 입력
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    Config(String),

    /// 파일시스템 에러
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn parse(filename: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            filename: filename.into(),
            message: message.to_string(),
        }
    }

    /// 에러 종류 식별자 (JSON `kind` 필드)
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidUpload(_) => "invalid_upload",
            Error::Parse { .. } => "parse_error",
            Error::Encrypted(_) => "encrypted",
            Error::PageOutOfRange { .. } => "page_out_of_range",
            Error::EmptyDocument => "empty_document",
            Error::Embedding(_) => "embedding_error",
            Error::Inference(_) => "inference_error",
            Error::Index(_) => "index_error",
            Error::Timeout { .. } => "timeout",
            Error::NotReady(_) => "not_ready",
            Error::SessionNotFound(_) => "session_not_found",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Config(_) => "config_error",
            Error::Io(_) => "io_error",
        }
    }

    /// 세션 진행을 멈추는 에러인지 여부
    ///
    /// 요청 단위 에러(잘못된 페이지, 빈 질문 등)는 세션 상태에 영향을 주지 않습니다.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::PageOutOfRange { .. }
                | Error::NotReady(_)
                | Error::SessionNotFound(_)
                | Error::InvalidRequest(_)
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::InvalidUpload(_) | Error::PageOutOfRange { .. } | Error::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Parse { .. } | Error::Encrypted(_) | Error::EmptyDocument => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::Embedding(_) | Error::Inference(_) => StatusCode::BAD_GATEWAY,
            Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::NotReady(_) => StatusCode::CONFLICT,
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::Index(_) | Error::Config(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else if self.is_fatal() {
            tracing::warn!("{}", self);
        } else {
            tracing::debug!("request rejected: {}", self);
        }

        // IO 에러 상세(경로 등)는 로그에만 남김
        let message = match &self {
            Error::Io(_) => "Internal error while processing the document".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors_are_not_fatal() {
        let err = Error::PageOutOfRange {
            page: 4,
            num_pages: 3,
        };
        assert!(!err.is_fatal());
        assert!(!Error::InvalidRequest("empty question".into()).is_fatal());
        assert!(Error::EmptyDocument.is_fatal());
        assert!(Error::parse("a.pdf", "bad xref").is_fatal());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::EmptyDocument.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            Error::Timeout {
                stage: Stage::Inference,
                secs: 5
            }
            .status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            Error::SessionNotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = Error::Timeout {
            stage: Stage::Embedding,
            secs: 30,
        };
        assert_eq!(err.to_string(), "embedding timed out after 30s");
        assert_eq!(err.kind(), "timeout");
    }
}
