//! 업로드 처리 모듈
//!
//! 업로드된 PDF 바이트를 검증하고, 파서가 읽을 수 있도록
//! 범위 한정(scoped) 임시 파일에 기록합니다.
//! 임시 파일은 성공/실패와 관계없이 항상 삭제됩니다.

use std::io::Write;
use std::path::Path;

use axum::body::Bytes;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// PDF MIME 타입
pub const PDF_MIME: &str = "application/pdf";

// ============================================================================
// Uploaded Document
// ============================================================================

/// 업로드된 원본 문서
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// 원본 파일명
    pub filename: String,
    /// 원본 바이트 (다운로드 시 그대로 반환)
    pub bytes: Bytes,
}

impl UploadedDocument {
    /// 업로드 검증 후 생성
    ///
    /// 확장자가 `.pdf`이거나 선언된 MIME이 `application/pdf`여야 합니다.
    pub fn new(
        filename: impl Into<String>,
        content_type: Option<&str>,
        bytes: impl Into<Bytes>,
    ) -> Result<Self> {
        let filename = sanitize_filename(&filename.into());
        let bytes = bytes.into();

        if !is_pdf(&filename, content_type) {
            return Err(Error::InvalidUpload(format!(
                "'{}' is not a PDF file",
                filename
            )));
        }

        if bytes.is_empty() {
            return Err(Error::InvalidUpload(format!("'{}' is empty", filename)));
        }

        Ok(Self { filename, bytes })
    }

    /// 로컬 파일에서 생성 (CLI용)
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        Self::new(filename, None, bytes)
    }

    /// 바이트 크기
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// SHA-256 지문 (hex)
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        format!("{:x}", digest)
    }

    /// 전체 텍스트 다운로드 파일명 (`<원본>_full_text.txt`)
    pub fn full_text_filename(&self) -> String {
        format!("{}_full_text.txt", self.filename)
    }

    /// 원본 바이트를 임시 파일에 기록
    pub fn write_temp(&self) -> Result<TempPdf> {
        TempPdf::write(&self.bytes)
    }
}

// ============================================================================
// TempPdf
// ============================================================================

/// 범위 한정 임시 PDF 파일
///
/// Drop 시 파일이 삭제됩니다. 정상 경로에서는 [`TempPdf::close`]로
/// 삭제 실패를 확인할 수 있습니다.
#[derive(Debug)]
pub struct TempPdf {
    file: NamedTempFile,
}

impl TempPdf {
    /// 바이트를 고유한 이름의 임시 파일에 기록
    pub fn write(bytes: &[u8]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("book-reader-")
            .suffix(".pdf")
            .tempfile()?;

        file.write_all(bytes)?;
        file.flush()?;

        tracing::debug!("Wrote {} bytes to {:?}", bytes.len(), file.path());
        Ok(Self { file })
    }

    /// 임시 파일 경로
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// 명시적으로 삭제
    pub fn close(self) -> Result<()> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        tracing::debug!("Removed temp file {:?}", path);
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// PDF 여부 판단 (확장자 또는 MIME)
pub fn is_pdf(filename: &str, content_type: Option<&str>) -> bool {
    let by_extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    let by_mime = content_type
        .map(|ct| {
            ct.split(';')
                .next()
                .map(|m| m.trim().eq_ignore_ascii_case(PDF_MIME))
                .unwrap_or(false)
        })
        .unwrap_or(false);

    by_extension || by_mime
}

/// 경로 부분과 제어 문자를 제거한 파일명
///
/// 따옴표 등은 그대로 두고 헤더 이스케이프는 다운로드 응답에서 처리합니다.
fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(raw);
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        "document.pdf".to_string()
    } else {
        cleaned.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
