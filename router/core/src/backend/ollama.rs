//! Ollama Backend Implementation
//!
//! Completion backend for a local Ollama server, so the triage, compression
//! and expansion stages can run without a hosted API. Ollama has no web
//! retrieval, so it does not implement [`ResearchBackend`].
//!
//! Uses the non-streaming `/api/generate` endpoint.
//!
//! [`ResearchBackend`]: super::ResearchBackend

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::traits::{BackendError, CompletionBackend, CompletionRequest, CompletionResponse};

/// Default Ollama host
pub const DEFAULT_HOST: &str = "localhost";

/// Default Ollama port
pub const DEFAULT_PORT: u16 = 11434;

/// Ollama backend client
#[derive(Clone, Debug)]
pub struct OllamaBackend {
    /// Host address
    host: String,
    /// Port number
    port: u16,
    /// HTTP client
    http_client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// # Errors
    ///
    /// Returns `BackendError::ClientBuild` if the HTTP client cannot be built.
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::ClientBuild(e.to_string()))?;

        Ok(Self {
            host: host.into(),
            port,
            http_client,
        })
    }

    /// Get the base URL
    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get generate endpoint URL
    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url())
    }
}

fn generate_body(request: &CompletionRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "prompt": request.prompt,
        "stream": false,
    });
    if let Some(temperature) = request.temperature {
        body["options"] = json!({ "temperature": temperature });
    }
    body
}

fn parse_generate(data: &Value) -> Result<(String, Option<u32>), BackendError> {
    let content = data
        .get("response")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::MalformedResponse("no response field".into()))?;

    if content.trim().is_empty() {
        return Err(BackendError::MalformedResponse("empty response".into()));
    }

    let tokens_used = data
        .get("eval_count")
        .and_then(Value::as_u64)
        .and_then(|c| u32::try_from(c).ok());

    Ok((content.to_string(), tokens_used))
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "Ollama"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, BackendError> {
        let start = Instant::now();

        let response = self
            .http_client
            .post(self.generate_url())
            .json(&generate_body(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), body));
        }

        let data: Value = response.json().await?;
        let (content, tokens_used) = parse_generate(&data)?;

        Ok(CompletionResponse {
            content,
            model: request.model.clone(),
            tokens_used,
            duration_ms: u64::try_from(start.elapsed().as_millis()).ok(),
        })
    }
}
