//! Scripted Test Backend
//!
//! One fake serving both completion and research calls from a fixed script,
//! recording every request so stage order, prompts, models and temperature
//! can be asserted.
//!
//! ```ignore
//! let backend = ScriptedBackend::replying(&["0Hello!"]);
//! // ... run the router ...
//! assert_eq!(backend.call_count(), 1);
//! ```

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use router_core::backend::{
    BackendError, CompletionBackend, CompletionRequest, CompletionResponse, ResearchBackend,
};

/// Model name recorded for research calls
pub const RESEARCH_MODEL: &str = "deep-research";

/// Tokens reported by every successful scripted call
pub const TOKENS_PER_CALL: u32 = 10;

/// Captured call for test verification
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    /// "complete" or "research"
    pub kind: &'static str,
    /// Model requested
    pub model: String,
    /// Prompt sent
    pub prompt: String,
    /// Temperature requested (research calls carry none)
    pub temperature: Option<f32>,
}

/// One scripted reply: text, or an HTTP status to fail with
pub type Reply = Result<String, u16>;

/// Backend replaying a script in order; panics when the script runs out
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    /// Backend answering with `replies`, one per call
    pub fn replying(replies: &[&str]) -> Arc<Self> {
        Self::with_script(replies.iter().map(|r| Ok((*r).to_string())).collect())
    }

    /// Backend following `script`; `Err(status)` fails that call
    pub fn with_script(script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::default(),
        })
    }

    /// Every call so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next(&self, call: Call) -> Result<CompletionResponse, BackendError> {
        let model = call.model.clone();
        let description = format!("{} {}", call.kind, call.prompt);
        self.calls.lock().unwrap().push(call);

        match self.script.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(CompletionResponse {
                content: text,
                model,
                tokens_used: Some(TOKENS_PER_CALL),
                duration_ms: Some(1),
            }),
            Some(Err(status)) => Err(BackendError::from_status(status, "scripted".to_string())),
            None => panic!("unexpected backend call: {description}"),
        }
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, BackendError> {
        self.next(Call {
            kind: "complete",
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            temperature: request.temperature,
        })
    }
}

#[async_trait]
impl ResearchBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn research(&self, prompt: &str) -> Result<CompletionResponse, BackendError> {
        self.next(Call {
            kind: "research",
            model: RESEARCH_MODEL.to_string(),
            prompt: prompt.to_string(),
            temperature: None,
        })
    }
}
