//! 답변 생성 모듈
//!
//! - LanguageModel: 프롬프트 → 답변 텍스트
//! - OllamaGenerator: 로컬 Ollama `/api/generate` 구현
//! - prompt: 검색된 청크를 문맥으로 채우는 "stuff" 프롬프트

mod ollama;
pub mod prompt;

use async_trait::async_trait;

use crate::error::Result;

pub use ollama::{ModelInfo, OllamaGenerator};
pub use prompt::build_qa_prompt;

/// 언어 모델 트레이트
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 프롬프트로 답변 생성 (스트리밍 없음)
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}
