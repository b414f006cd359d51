//! 콘텐츠 추출 모듈
//!
//! 업로드된 PDF를 임시 파일로 기록한 뒤 페이지별 텍스트를 추출합니다.
//! - 페이지 텍스트: 빈 결과는 에러가 아닌 경고
//! - 전체 텍스트: `--- Page N ---` 구분자와 빈 페이지 플레이스홀더

pub mod pdf;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::upload::UploadedDocument;

pub use pdf::PdfReader;

/// 텍스트가 없는 페이지의 대체 문자열
pub const NO_TEXT_PLACEHOLDER: &str = "(No text - image page)";

/// 텍스트가 없는 페이지 경고
pub const EMPTY_PAGE_WARNING: &str = "No text extracted from this page (maybe scanned/image-based).";

/// 전체 텍스트 미리보기 최대 글자 수
pub const PREVIEW_CHARS: usize = 5000;

/// 미리보기 잘림 표시
pub const TRUNCATION_MARKER: &str = "\n\n... (truncated)";

// ============================================================================
// Page Text
// ============================================================================

/// 한 페이지의 추출 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageText {
    /// 페이지 번호 (1부터 시작)
    pub number: usize,
    /// 추출된 텍스트 (스캔 페이지면 빈 문자열)
    pub text: String,
}

impl PageText {
    /// 의미있는 텍스트가 있는지
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// 빈 페이지 경고 (에러 아님)
    pub fn warning(&self) -> Option<&'static str> {
        if self.has_text() {
            None
        } else {
            Some(EMPTY_PAGE_WARNING)
        }
    }
}

// ============================================================================
// Extracted Document
// ============================================================================

/// 문서 전체 추출 결과
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pages: Vec<PageText>,
}

impl ExtractedDocument {
    pub fn new(pages: Vec<PageText>) -> Self {
        Self { pages }
    }

    /// 총 페이지 수
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 모든 페이지
    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    /// 페이지 조회 (1부터 시작, `[1, page_count]` 검증)
    pub fn page(&self, number: usize) -> Result<&PageText> {
        if number == 0 || number > self.pages.len() {
            return Err(Error::PageOutOfRange {
                page: number,
                num_pages: self.pages.len(),
            });
        }
        Ok(&self.pages[number - 1])
    }

    /// 텍스트가 있는 페이지 수
    pub fn pages_with_text(&self) -> usize {
        self.pages.iter().filter(|p| p.has_text()).count()
    }

    /// 문서 어딘가에 텍스트가 있는지
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(PageText::has_text)
    }

    /// 페이지 구분자가 포함된 전체 텍스트 (다운로드용)
    pub fn full_text(&self) -> String {
        let mut full_text = String::new();
        for page in &self.pages {
            full_text.push_str(&format!("\n\n--- Page {} ---\n", page.number));
            if page.has_text() {
                full_text.push_str(&page.text);
            } else {
                full_text.push_str(NO_TEXT_PLACEHOLDER);
            }
        }
        full_text
    }

    /// 구분자 없이 이어붙인 텍스트 (청킹용)
    pub fn plain_text(&self) -> String {
        self.pages
            .iter()
            .filter(|p| p.has_text())
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// 업로드 문서에서 모든 페이지 추출
///
/// 임시 파일은 성공/실패와 관계없이 삭제됩니다.
pub fn extract_document(upload: &UploadedDocument) -> Result<ExtractedDocument> {
    let temp = upload.write_temp()?;

    let result = PdfReader::open(temp.path(), &upload.filename)
        .and_then(|reader| reader.extract_all())
        .map(ExtractedDocument::new);

    if let Err(e) = temp.close() {
        tracing::warn!("Failed to remove temp file for {}: {}", upload.filename, e);
    }

    if let Ok(ref doc) = result {
        tracing::info!(
            "Extracted {}: {} pages ({} with text)",
            upload.filename,
            doc.page_count(),
            doc.pages_with_text()
        );
    }

    result
}

/// 업로드 문서에서 한 페이지만 추출
///
/// 범위를 벗어난 페이지는 텍스트 추출 없이 거부됩니다.
pub fn extract_page(upload: &UploadedDocument, page: usize) -> Result<(PageText, usize)> {
    let temp = upload.write_temp()?;

    let result = PdfReader::open(temp.path(), &upload.filename)
        .and_then(|reader| Ok((reader.page_text(page)?, reader.page_count())));

    if let Err(e) = temp.close() {
        tracing::warn!("Failed to remove temp file for {}: {}", upload.filename, e);
    }

    result
}

/// 비동기 추출 (PDF 파싱은 CPU 바운드이므로 spawn_blocking 사용)
pub async fn extract_upload(upload: &UploadedDocument) -> Result<ExtractedDocument> {
    let upload = upload.clone();
    tokio::task::spawn_blocking(move || extract_document(&upload))
        .await
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}

/// 미리보기용으로 자르기 (UTF-8 안전)
///
/// 잘렸으면 끝에 `... (truncated)`를 붙이고 true를 반환합니다.
pub fn preview(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER), true),
        None => (text.to_string(), false),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExtractedDocument {
        ExtractedDocument::new(vec![
            PageText {
                number: 1,
                text: "Chapter one".to_string(),
            },
            PageText {
                number: 2,
                text: "Chapter two".to_string(),
            },
            PageText {
                number: 3,
                text: "  \n".to_string(),
            },
        ])
    }

    #[test]
    fn test_page_warning() {
        let doc = sample();
        assert!(doc.page(1).unwrap().warning().is_none());
        assert_eq!(doc.page(3).unwrap().warning(), Some(EMPTY_PAGE_WARNING));
    }

    #[test]
    fn test_page_out_of_range() {
        let doc = sample();
        assert!(matches!(
            doc.page(0),
            Err(Error::PageOutOfRange { page: 0, num_pages: 3 })
        ));
        assert!(matches!(
            doc.page(4),
            Err(Error::PageOutOfRange { page: 4, num_pages: 3 })
        ));
    }

    #[test]
    fn test_full_text_markers() {
        let full = sample().full_text();
        assert_eq!(
            full,
            "\n\n--- Page 1 ---\nChapter one\n\n--- Page 2 ---\nChapter two\n\n--- Page 3 ---\n(No text - image page)"
        );

        let p1 = full.find("--- Page 1 ---").unwrap();
        let p2 = full.find("--- Page 2 ---").unwrap();
        let p3 = full.find("--- Page 3 ---").unwrap();
        assert!(p1 < p2 && p2 < p3);
    }

    #[test]
    fn test_plain_text_skips_empty_pages() {
        let doc = sample();
        assert_eq!(doc.plain_text(), "Chapter one\nChapter two");
        assert!(doc.has_text());
        assert_eq!(doc.pages_with_text(), 2);
    }

    #[test]
    fn test_scanned_document_has_no_text() {
        let doc = ExtractedDocument::new(vec![PageText {
            number: 1,
            text: String::new(),
        }]);
        assert!(!doc.has_text());
        assert!(doc.plain_text().is_empty());
    }

    #[test]
    fn test_preview() {
        let (short, truncated) = preview("hello", 10);
        assert_eq!(short, "hello");
        assert!(!truncated);

        let (cut, truncated) = preview("안녕하세요 세계", 5);
        assert_eq!(cut, "안녕하세요\n\n... (truncated)");
        assert!(truncated);

        let (exact, truncated) = preview("abcde", 5);
        assert_eq!(exact, "abcde");
        assert!(!truncated);
    }
}
