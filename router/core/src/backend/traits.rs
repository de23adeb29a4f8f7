//! Completion Backend Traits
//!
//! The router talks to language models through two capabilities:
//! - [`CompletionBackend`]: plain prompt-in, text-out completion against a
//!   named model (triage, compression and expansion stages)
//! - [`ResearchBackend`]: completion augmented with live web retrieval
//!   (research stage)
//!
//! Implementations handle provider-specific details (API formats, auth, etc.).
//! Calls are single round-trips: no streaming, no retries.

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by completion backends
#[derive(Debug, Error)]
pub enum BackendError {
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// Network-level failure (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Credentials were rejected
    #[error("Authentication failed - check your API key")]
    Authentication,

    /// Provider quota or rate limit hit
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Any other non-success HTTP status
    #[error("Backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// The response parsed but carried no usable text
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl BackendError {
    /// Map a non-success HTTP status and body to an error
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimited(body),
            _ => Self::Status { status, body },
        }
    }
}

/// A single completion request
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompletionRequest {
    /// The prompt to send
    pub prompt: String,
    /// Model to use (backend-specific identifier)
    pub model: String,
    /// Sampling temperature, provider default when `None`
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a new request with prompt and model
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature: None,
        }
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }
}

/// Response from a completion or research call
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionResponse {
    /// The response text
    pub content: String,
    /// Model that generated the response
    pub model: String,
    /// Tokens used (if reported)
    pub tokens_used: Option<u32>,
    /// Round-trip time in milliseconds
    pub duration_ms: Option<u64>,
}

impl CompletionResponse {
    /// Response with content only
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            tokens_used: None,
            duration_ms: None,
        }
    }
}

/// Plain text completion
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name (e.g., "OpenAI", "Ollama")
    fn name(&self) -> &str;

    /// Send a prompt to `request.model` and wait for the full response
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, BackendError>;
}

/// Completion with live information retrieval
#[async_trait]
pub trait ResearchBackend: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Send a research prompt and wait for the full response
    async fn research(&self, prompt: &str) -> Result<CompletionResponse, BackendError>;
}
