//! QA 프롬프트 템플릿

use crate::knowledge::SearchResult;

/// "stuff" 방식 QA 프롬프트 머리말
const QA_INSTRUCTIONS: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// 검색 결과 청크를 빈 줄로 이어 문맥 구성
pub fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| r.chunk_text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 문맥과 질문으로 최종 프롬프트 생성
pub fn build_qa_prompt(question: &str, results: &[SearchResult]) -> String {
    format!(
        "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        QA_INSTRUCTIONS,
        build_context(results),
        question.trim()
    )
}
