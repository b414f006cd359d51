//! HTTP 핸들러

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::AppState;
use crate::error::{Error, Result};
use crate::extractor::{preview, PREVIEW_CHARS};
use crate::qa::Answer;
use crate::session::SessionSummary;
use crate::upload::{UploadedDocument, PDF_MIME};

const INDEX_HTML: &str = include_str!("index.html");

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreatedSession {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub page: usize,
    pub num_pages: usize,
    pub text: String,
    pub warning: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub filename: String,
    pub page_count: usize,
    /// 미리보기 (최대 5000자)
    pub text: String,
    pub truncated: bool,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub filename: String,
    pub data_uri: String,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/sessions
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<CreatedSession>) {
    let id = state.sessions().create();
    (StatusCode::CREATED, Json(CreatedSession { id }))
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.sessions().summary(&id)?))
}

/// DELETE /api/sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_session_id(&id)?;
    state.sessions().remove(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sessions/:id/document (multipart, 필드 `file`)
pub async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<SessionSummary>> {
    let id = parse_session_id(&id)?;
    // 본문을 읽기 전에 세션 확인
    state.sessions().phase(&id)?;

    let limit = state.config().server.max_upload_bytes;
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("document.pdf").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

        tracing::info!("Received upload: {} ({} bytes)", filename, bytes.len());
        upload = Some(UploadedDocument::new(
            filename,
            content_type.as_deref(),
            bytes,
        )?);
        break;
    }

    let upload = upload.ok_or_else(|| Error::InvalidUpload("missing 'file' field".into()))?;
    let summary = state.load_document(id, upload).await?;
    Ok(Json(summary))
}

/// GET /api/sessions/:id/pages/:n
pub async fn get_page(
    State(state): State<AppState>,
    Path((id, page)): Path<(String, String)>,
) -> Result<Json<PageResponse>> {
    let id = parse_session_id(&id)?;
    let page: usize = page
        .parse()
        .map_err(|_| Error::InvalidRequest(format!("'{}' is not a page number", page)))?;

    let doc = state.sessions().document(&id)?;
    let page_text = doc.extracted.page(page)?;

    Ok(Json(PageResponse {
        page,
        num_pages: doc.extracted.page_count(),
        text: page_text.text.clone(),
        warning: page_text.warning(),
    }))
}

/// GET /api/sessions/:id/text
pub async fn full_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TextResponse>> {
    let id = parse_session_id(&id)?;
    let doc = state.sessions().document(&id)?;
    let (text, truncated) = preview(&doc.extracted.full_text(), PREVIEW_CHARS);

    Ok(Json(TextResponse {
        filename: doc.upload.filename.clone(),
        page_count: doc.extracted.page_count(),
        text,
        truncated,
    }))
}

/// GET /api/sessions/:id/preview
pub async fn pdf_preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PreviewResponse>> {
    let id = parse_session_id(&id)?;
    let doc = state.sessions().document(&id)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&doc.upload.bytes);

    Ok(Json(PreviewResponse {
        filename: doc.upload.filename.clone(),
        data_uri: format!("data:{};base64,{}", PDF_MIME, encoded),
    }))
}

/// GET /api/sessions/:id/download/pdf
pub async fn download_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_session_id(&id)?;
    let doc = state.sessions().document(&id)?;

    Ok(attachment(
        PDF_MIME,
        &doc.upload.filename,
        doc.upload.bytes.clone(),
    ))
}

/// GET /api/sessions/:id/download/text
pub async fn download_text(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_session_id(&id)?;
    let doc = state.sessions().document(&id)?;

    Ok(attachment(
        "text/plain; charset=utf-8",
        &doc.upload.full_text_filename(),
        Bytes::from(doc.extracted.full_text()),
    ))
}

/// POST /api/sessions/:id/ask
pub async fn ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Answer>> {
    let id = parse_session_id(&id)?;
    if request.question.trim().is_empty() {
        return Err(Error::InvalidRequest("question must not be empty".into()));
    }

    let engine = state.sessions().engine(&id)?;
    tracing::info!("Session {}: question ({} chars)", id, request.question.len());

    let answer = engine.ask(&request.question).await?;
    Ok(Json(answer))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_session_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| Error::SessionNotFound(raw.to_string()))
}

fn multipart_error(err: MultipartError, limit: usize) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::InvalidUpload(format!(
            "file exceeds the {} MiB upload limit",
            limit / (1024 * 1024)
        ))
    } else {
        Error::InvalidUpload(format!("malformed multipart body: {}", err.body_text()))
    }
}

/// 첨부 파일 응답 (원본 파일명 유지)
fn attachment(content_type: &'static str, filename: &str, body: Bytes) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, content_disposition(filename)),
        ],
        body,
    )
}

/// `attachment; filename="..."; filename*=UTF-8''...` (RFC 6266)
fn content_disposition(filename: &str) -> HeaderValue {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .filter(|c| *c != '"' && *c != '\\')
        .collect();

    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect();

    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii, encoded
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
