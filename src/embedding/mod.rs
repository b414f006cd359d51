//! 임베딩 모듈 - 로컬 Ollama를 통한 텍스트 벡터화
//!
//! 텍스트를 벡터로 변환하는 임베딩 프로바이더입니다.
//! 청크 인덱싱과 질문 임베딩에 같은 프로바이더를 사용합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OllamaEmbedding::new(&config.ollama)?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::OllamaConfig;
use crate::error::{Error, Result};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 고정 길이 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Ollama Embedding
// ============================================================================

/// 실패 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 500;

/// Ollama `/api/embed` 구현체
///
/// ref: https://github.com/ollama/ollama/blob/main/docs/api.md#generate-embeddings
#[derive(Debug, Clone)]
pub struct OllamaEmbedding {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    batch_size: usize,
    max_retries: u32,
}

impl OllamaEmbedding {
    /// 설정으로 생성
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = config
            .base_url
            .join("api/embed")
            .map_err(|e| Error::Config(format!("Invalid Ollama URL: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            model: config.embed_model.clone(),
            batch_size: config.embed_batch_size.max(1),
            max_retries: MAX_RETRIES,
        })
    }

    /// 재시도 횟수 지정
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 한 번의 `/api/embed` 호출 (재시도 포함)
    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input,
        };

        let mut last_error: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1));
                tracing::warn!(
                    "Embedding request failed, retrying in {:?} (attempt {}/{})",
                    backoff,
                    attempt,
                    self.max_retries
                );
                tokio::time::sleep(backoff).await;
            }

            let response = match self
                .client
                .post(self.endpoint.clone())
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(Error::Embedding(format!(
                        "Failed to reach Ollama at {}: {}",
                        self.endpoint, e
                    )));
                    continue;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| Error::Embedding(format!("Failed to read response body: {}", e)))?;

            if status.is_success() {
                let parsed: EmbedResponse = serde_json::from_str(&body).map_err(|e| {
                    Error::Embedding(format!("Failed to parse embedding response: {}", e))
                })?;

                if parsed.embeddings.len() != input.len() {
                    return Err(Error::Embedding(format!(
                        "Ollama returned {} embeddings for {} inputs",
                        parsed.embeddings.len(),
                        input.len()
                    )));
                }
                return Ok(parsed.embeddings);
            }

            let message = serde_json::from_str::<OllamaError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);

            // 과부하/일시 장애만 재시도
            if status.as_u16() == 429 || status.as_u16() == 503 {
                last_error = Some(Error::Embedding(format!(
                    "Ollama busy ({}): {}",
                    status, message
                )));
                continue;
            }

            return Err(Error::Embedding(format!(
                "Ollama error ({}) for model '{}': {}",
                status, self.model, message
            )));
        }

        Err(last_error.unwrap_or_else(|| {
            Error::Embedding(format!("Embedding failed after {} retries", self.max_retries))
        }))
    }
}

/// `/api/embed` 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// `/api/embed` 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama 에러 응답
#[derive(Debug, Deserialize)]
pub(crate) struct OllamaError {
    pub(crate) error: String,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.request(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::Embedding("Ollama returned no embedding".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            tracing::debug!(
                "Embedding batch {}/{}",
                i + 1,
                texts.len().div_ceil(self.batch_size)
            );
            results.extend(self.request(batch).await?);
        }

        Ok(results)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
