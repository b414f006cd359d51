//! PDF 텍스트 추출 모듈
//!
//! lopdf 크레이트로 PDF를 열고 페이지별로 텍스트를 추출합니다.

use std::path::Path;

use lopdf::Document;

use crate::error::{Error, Result};

use super::PageText;

/// 열린 PDF 문서
pub struct PdfReader {
    doc: Document,
    /// PDF 내부 페이지 번호 (오름차순)
    page_numbers: Vec<u32>,
    filename: String,
}

impl PdfReader {
    /// PDF 파일 열기
    ///
    /// # Arguments
    /// * `path` - PDF 파일 경로
    /// * `filename` - 에러 메시지에 표시할 원본 파일명
    pub fn open(path: &Path, filename: &str) -> Result<Self> {
        let mut doc = Document::load(path).map_err(|e| load_error(filename, e))?;

        // 소유자 암호만 걸린 문서는 빈 사용자 암호로 열림
        if doc.is_encrypted() {
            if let Err(e) = doc.decrypt("") {
                tracing::debug!("Empty-password decryption of {} failed: {}", filename, e);
                return Err(Error::Encrypted(filename.to_string()));
            }
            tracing::debug!("Decrypted {} with the empty user password", filename);
        }

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(Error::parse(filename, "document has no pages"));
        }

        tracing::debug!("Opened {} ({} pages)", filename, page_numbers.len());

        Ok(Self {
            doc,
            page_numbers,
            filename: filename.to_string(),
        })
    }

    /// 총 페이지 수
    pub fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    /// 페이지 텍스트 추출 (1부터 시작)
    ///
    /// 범위를 벗어나면 파서를 호출하지 않고 에러를 반환합니다.
    /// 텍스트가 없는 페이지(스캔 이미지 등)는 빈 문자열입니다.
    pub fn page_text(&self, page: usize) -> Result<PageText> {
        let num_pages = self.page_count();
        if page == 0 || page > num_pages {
            return Err(Error::PageOutOfRange { page, num_pages });
        }

        let pdf_page = self.page_numbers[page - 1];
        let text = match self.doc.extract_text(&[pdf_page]) {
            Ok(text) => text.trim_end().to_string(),
            Err(e) => {
                // 폰트 인코딩 등 디코딩 실패는 빈 페이지로 취급
                tracing::warn!(
                    "Failed to extract text from {} page {}: {}",
                    self.filename,
                    page,
                    e
                );
                String::new()
            }
        };

        Ok(PageText { number: page, text })
    }

    /// 모든 페이지 추출 (페이지 순서대로)
    pub fn extract_all(&self) -> Result<Vec<PageText>> {
        (1..=self.page_count()).map(|p| self.page_text(p)).collect()
    }
}

/// lopdf 로드 에러 분류
fn load_error(filename: &str, err: lopdf::Error) -> Error {
    match err {
        lopdf::Error::Decryption(_) => Error::Encrypted(filename.to_string()),
        other => Error::parse(filename, other.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_garbage_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not a pdf at all").unwrap();

        let result = PdfReader::open(file.path(), "garbage.pdf");
        match result {
            Err(Error::Parse { filename, .. }) => assert_eq!(filename, "garbage.pdf"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("garbage should not parse"),
        }
    }

    #[test]
    fn test_load_error_classification() {
        let err = load_error(
            "locked.pdf",
            lopdf::Error::Decryption(lopdf::encryption::DecryptionError::IncorrectPassword),
        );
        assert!(matches!(err, Error::Encrypted(ref name) if name == "locked.pdf"));

        let err = load_error("broken.pdf", lopdf::Error::Trailer);
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_open_missing_file_is_error() {
        let result = PdfReader::open(Path::new("/definitely/not/here.pdf"), "here.pdf");
        assert!(result.is_err());
    }
}
