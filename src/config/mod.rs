//! 설정 모듈
//!
//! 기본값 → 환경변수(`OLLAMA_HOST`) → CLI 플래그 순으로 덮어씁니다.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Ollama 기본 주소
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

// ============================================================================
// AppConfig
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub chunking: ChunkingConfig,
    pub ollama: OllamaConfig,
    pub qa: QaConfig,
}

impl AppConfig {
    /// 기본값 + 환경변수
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Ollama 자체가 사용하는 변수를 그대로 따름
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            if !host.trim().is_empty() {
                tracing::debug!("Using Ollama host from OLLAMA_HOST");
                config.ollama.base_url = normalize_ollama_host(&host)?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.qa.top_k == 0 {
            return Err(Error::Config("top_k must be greater than 0".into()));
        }
        if self.ollama.embed_batch_size == 0 {
            return Err(Error::Config("embed_batch_size must be greater than 0".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Sections
// ============================================================================

/// 웹 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 업로드 최대 크기 (바이트)
    pub max_upload_bytes: usize,
    /// 유휴 세션 만료 시간 (초)
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_upload_bytes: 200 * 1024 * 1024,
            session_ttl_secs: 60 * 60,
        }
    }
}

impl ServerConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// 청킹 설정 (문자 단위)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// 로컬 Ollama 프로세스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: Url,
    /// 임베딩 모델
    pub embed_model: String,
    /// 답변 생성 모델
    pub generate_model: String,
    pub temperature: f32,
    /// `/api/embed` 한 번에 보낼 텍스트 수
    pub embed_batch_size: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_OLLAMA_URL).expect("default Ollama URL is valid"),
            embed_model: "all-minilm".to_string(),
            generate_model: "llama3".to_string(),
            temperature: 0.0,
            embed_batch_size: 32,
        }
    }
}

/// 질의응답 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    /// QA 기능 사용 여부 (false면 뷰어/추출만)
    pub enabled: bool,
    pub top_k: usize,
    /// 인덱스 구축(전체 청크 임베딩) 제한 시간 (초)
    pub index_timeout_secs: u64,
    /// 질문 하나(임베딩 + 생성) 제한 시간 (초)
    pub answer_timeout_secs: u64,
    /// 화면에 표시할 출처 청크 최대 글자 수
    pub source_preview_chars: usize,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: 4,
            index_timeout_secs: 300,
            answer_timeout_secs: 120,
            source_preview_chars: 300,
        }
    }
}

impl QaConfig {
    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index_timeout_secs)
    }

    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_secs)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// `OLLAMA_HOST` 값을 URL로 정규화
///
/// Ollama는 `0.0.0.0:11434`, `localhost` 처럼 스킴/포트 없는 값도 허용합니다.
pub fn normalize_ollama_host(raw: &str) -> Result<Url> {
    let raw = raw.trim().trim_end_matches('/');
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| Error::Config(format!("Invalid Ollama host '{}': {}", raw, e)))?;

    if url.port().is_none() && !with_scheme_has_explicit_default_port(&with_scheme) {
        url.set_port(Some(11434))
            .map_err(|_| Error::Config(format!("Invalid Ollama host '{}'", raw)))?;
    }

    // 바인드 주소는 클라이언트 입장에서 루프백으로
    if url.host_str() == Some("0.0.0.0") {
        url.set_host(Some("127.0.0.1"))
            .map_err(|e| Error::Config(format!("Invalid Ollama host '{}': {}", raw, e)))?;
    }

    Ok(url)
}

/// `http://host:80` 처럼 기본 포트를 명시한 경우 (Url은 기본 포트를 None으로 보고함)
fn with_scheme_has_explicit_default_port(s: &str) -> bool {
    let after_scheme = s.split("://").nth(1).unwrap_or("");
    let authority = after_scheme.split('/').next().unwrap_or("");
    authority
        .rsplit_once(':')
        .map(|(_, port)| port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================
