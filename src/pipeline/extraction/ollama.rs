use serde::{Deserialize, Serialize};

use super::types::{GenerationOptions, LlmClient};
use super::ExtractionError;
use crate::config;

/// Blocking HTTP client for a local Ollama instance. One endpoint, no
/// pooling — the per-call timeout is the only backpressure mechanism.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    /// Default local instance with the configured multi-minute timeout.
    pub fn default_local() -> Self {
        Self::new(config::DEFAULT_OLLAMA_URL, config::INFERENCE_TIMEOUT_SECS)
    }

}

/// Pick a model by preference order. Discovery failure or an empty tag
/// list falls back to the hardcoded identifier rather than erroring —
/// the caller finds out soon enough if that one is missing too.
pub fn resolve_model<C: LlmClient>(client: &C) -> String {
    match client.list_models() {
        Ok(available) if !available.is_empty() => {
            for preferred in config::PREFERRED_MODELS {
                if available.iter().any(|m| m.starts_with(preferred)) {
                    return (*preferred).to_string();
                }
            }
            tracing::warn!(
                available = available.len(),
                "No preferred model found, using fallback"
            );
            config::FALLBACK_MODEL.to_string()
        }
        Ok(_) => config::FALLBACK_MODEL.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Model discovery failed, using fallback");
            config::FALLBACK_MODEL.to_string()
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl LlmClient for OllamaClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ExtractionError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            options,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                ExtractionError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                ExtractionError::HttpClient(format!(
                    "Request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                ExtractionError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::ServiceError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| ExtractionError::ResponseParsing(e.to_string()))?;

        Ok(parsed.response)
    }

    fn list_models(&self) -> Result<Vec<String>, ExtractionError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().map_err(|e| {
            if e.is_connect() {
                ExtractionError::Connection(self.base_url.clone())
            } else {
                ExtractionError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::ServiceError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TagsResponse = response
            .json()
            .map_err(|e| ExtractionError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

/// Mock client for tests — returns one canned response per call, in
/// order, repeating the last one when exhausted.
pub struct MockLlmClient {
    responses: Vec<String>,
    call_index: std::sync::atomic::AtomicUsize,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            responses: vec![response.to_string()],
            call_index: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// One response per pass, in call order.
    pub fn with_responses(responses: &[&str]) -> Self {
        Self {
            responses: responses.iter().map(|s| s.to_string()).collect(),
            call_index: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of generate calls made so far.
    pub fn calls(&self) -> usize {
        self.call_index.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl LlmClient for MockLlmClient {
    fn generate(
        &self,
        _model: &str,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, ExtractionError> {
        let idx = self
            .call_index
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self
            .responses
            .get(idx)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default())
    }

    fn list_models(&self) -> Result<Vec<String>, ExtractionError> {
        Ok(vec!["medgemma:latest".to_string()])
    }
}

/// Mock client that always fails with a transport error.
pub struct FailingLlmClient;

impl LlmClient for FailingLlmClient {
    fn generate(
        &self,
        _model: &str,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String, ExtractionError> {
        Err(ExtractionError::Connection(
            config::DEFAULT_OLLAMA_URL.to_string(),
        ))
    }

    fn list_models(&self) -> Result<Vec<String>, ExtractionError> {
        Err(ExtractionError::Connection(
            config::DEFAULT_OLLAMA_URL.to_string(),
        ))
    }
}
