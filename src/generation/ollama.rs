//! Ollama LLM 클라이언트
//!
//! ref: https://github.com/ollama/ollama/blob/main/docs/api.md

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::LanguageModel;
use crate::config::OllamaConfig;
use crate::embedding::OllamaError;
use crate::error::{Error, Result};

/// `/api/generate` 클라이언트
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: Url,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// 로컬에 받아둔 모델 정보 (`/api/tags`)
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

impl ModelInfo {
    /// `llama3`가 `llama3:latest`와 일치하도록 태그 생략 허용
    pub fn matches(&self, model: &str) -> bool {
        self.name == model
            || (!model.contains(':')
                && self
                    .name
                    .strip_prefix(model)
                    .map(|rest| rest.starts_with(':'))
                    .unwrap_or(false))
    }
}

impl OllamaGenerator {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.generate_model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid Ollama URL: {}", e)))
    }

    /// 로컬 모델 목록 조회 (Ollama 도달 가능 여부 확인 겸용)
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("api/tags")?;

        let response = self
            .client
            .get(url.clone())
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Ollama is not reachable at {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Inference(format!(
                "Ollama returned HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse model list: {}", e)))?;

        Ok(tags.models)
    }

    /// Ollama가 응답하는지 여부
    pub async fn health_check(&self) -> bool {
        match self.list_models().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Ollama health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = self.endpoint("api/generate")?;
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        tracing::info!("Generating answer with model: {}", self.model);

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Generation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(Error::Inference(format!(
                "Ollama error ({}) for model '{}': {}",
                status, self.model, message
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse generation response: {}", e)))?;

        Ok(generated.response.trim().to_string())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str) -> ModelInfo {
        ModelInfo {
            name: name.to_string(),
            size: 0,
        }
    }

    #[test]
    fn test_model_matches_latest_tag() {
        assert!(model("llama3:latest").matches("llama3"));
        assert!(model("llama3:8b").matches("llama3:8b"));
        assert!(!model("llama3:8b").matches("llama3:70b"));
        assert!(!model("llama3.1:latest").matches("llama3"));
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            model: "llama3",
            prompt: "hi",
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.0);
    }

    #[test]
    fn test_tags_without_models_field() {
        let tags: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(tags.models.is_empty());
    }
}
