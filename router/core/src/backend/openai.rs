//! OpenAI Backend Implementation
//!
//! - `POST {base}/chat/completions` - plain completions (single user message)
//! - `POST {base}/responses` - research completions with the
//!   `web_search_preview` tool enabled
//!
//! One HTTP client is built per backend with a single overall timeout.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::traits::{
    BackendError, CompletionBackend, CompletionRequest, CompletionResponse, ResearchBackend,
};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default research model
pub const DEFAULT_RESEARCH_MODEL: &str = "o4-mini-deep-research";

/// Longest error body kept in `BackendError::Status`
const MAX_ERROR_BODY: usize = 2048;

/// OpenAI API client
#[derive(Clone)]
pub struct OpenAiBackend {
    /// API base URL, without trailing slash
    base_url: String,
    /// Bearer token
    api_key: String,
    /// Model used by `research`
    research_model: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("base_url", &self.base_url)
            .field("research_model", &self.research_model)
            .finish_non_exhaustive()
    }
}

impl OpenAiBackend {
    /// Create a new backend
    ///
    /// # Errors
    ///
    /// Returns `BackendError::ClientBuild` if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        research_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::ClientBuild(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            research_model: research_model.into(),
            http_client,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn responses_url(&self) -> String {
        format!("{}/responses", self.base_url)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, BackendError> {
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(BackendError::from_status(status.as_u16(), body));
        }

        Ok(response.json().await?)
    }
}

/// Chat Completions request body
fn chat_body(request: &CompletionRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": [{ "role": "user", "content": request.prompt }],
    });
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    body
}

/// Responses request body with web search
fn research_body(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "input": prompt,
        "background": false,
        "tools": [{ "type": "web_search_preview" }],
    })
}

/// Text of the first choice of a Chat Completions response
fn parse_chat_content(data: &Value) -> Result<String, BackendError> {
    let content = data
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.pointer("/message/content"))
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::MalformedResponse("no choices[0].message.content".into()))?;

    if content.trim().is_empty() {
        return Err(BackendError::MalformedResponse("empty content".into()));
    }
    Ok(content.to_string())
}

/// Concatenated `output_text` of a Responses response
///
/// Uses the top-level `output_text` field when present, otherwise joins the
/// `output_text` parts of every message item in `output`.
fn parse_output_text(data: &Value) -> Result<String, BackendError> {
    let text = if let Some(text) = data.get("output_text").and_then(Value::as_str) {
        text.to_string()
    } else {
        data.get("output")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.get("type").and_then(Value::as_str) == Some("message"))
                    .filter_map(|item| item.get("content").and_then(Value::as_array))
                    .flatten()
                    .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect::<String>()
            })
            .unwrap_or_default()
    };

    if text.trim().is_empty() {
        return Err(BackendError::MalformedResponse("no output_text".into()));
    }
    Ok(text)
}

fn usage_tokens(data: &Value) -> Option<u32> {
    data.pointer("/usage/total_tokens")
        .and_then(Value::as_u64)
        .and_then(|t| u32::try_from(t).ok())
}

fn elapsed_ms(start: Instant) -> Option<u64> {
    u64::try_from(start.elapsed().as_millis()).ok()
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, BackendError> {
        let start = Instant::now();
        let data = self.post_json(&self.chat_url(), &chat_body(request)).await?;

        Ok(CompletionResponse {
            content: parse_chat_content(&data)?,
            model: request.model.clone(),
            tokens_used: usage_tokens(&data),
            duration_ms: elapsed_ms(start),
        })
    }
}

#[async_trait]
impl ResearchBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn research(&self, prompt: &str) -> Result<CompletionResponse, BackendError> {
        let start = Instant::now();
        let body = research_body(&self.research_model, prompt);
        let data = self.post_json(&self.responses_url(), &body).await?;

        Ok(CompletionResponse {
            content: parse_output_text(&data)?,
            model: self.research_model.clone(),
            tokens_used: usage_tokens(&data),
            duration_ms: elapsed_ms(start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> OpenAiBackend {
        OpenAiBackend::new(
            "https://api.example.com/v1/",
            "sk-test",
            DEFAULT_RESEARCH_MODEL,
            Duration::from_secs(600),
        )
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let backend = backend();
        assert_eq!(backend.chat_url(), "https://api.example.com/v1/chat/completions");
        assert_eq!(backend.responses_url(), "https://api.example.com/v1/responses");
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", backend());
        assert!(!rendered.contains("sk-test"));
    }

    #[test]
    fn test_chat_body() {
        let body = chat_body(&CompletionRequest::new("Hi", "gpt-4o-mini"));
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hi");
        assert!(body.get("temperature").is_none());

        let body = chat_body(&CompletionRequest::new("Hi", "m").with_temperature(0.25));
        assert_eq!(body["temperature"], 0.25);
    }

    #[test]
    fn test_research_body() {
        let body = research_body("o4-mini-deep-research", "points please");
        assert_eq!(body["input"], "points please");
        assert_eq!(body["background"], false);
        assert_eq!(body["tools"][0]["type"], "web_search_preview");
    }

    #[test]
    fn test_parse_chat_content() {
        let data = json!({
            "choices": [{ "message": { "role": "assistant", "content": "0Hello there" } }],
            "usage": { "total_tokens": 42 }
        });
        assert_eq!(parse_chat_content(&data).unwrap(), "0Hello there");
        assert_eq!(usage_tokens(&data), Some(42));

        assert!(parse_chat_content(&json!({ "choices": [] })).is_err());
        let blank = json!({ "choices": [{ "message": { "content": "  " } }] });
        assert!(matches!(
            parse_chat_content(&blank),
            Err(BackendError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_output_text_from_items() {
        let data = json!({
            "output": [
                { "type": "web_search_call", "status": "completed" },
                {
                    "type": "message",
                    "content": [
                        { "type": "output_text", "text": "1. First\n" },
                        { "type": "output_text", "text": "2. Second" }
                    ]
                }
            ]
        });
        assert_eq!(parse_output_text(&data).unwrap(), "1. First\n2. Second");
    }

    #[test]
    fn test_parse_output_text_top_level() {
        let data = json!({ "output_text": "1. Only" });
        assert_eq!(parse_output_text(&data).unwrap(), "1. Only");
        assert!(parse_output_text(&json!({ "output": [] })).is_err());
    }
}
