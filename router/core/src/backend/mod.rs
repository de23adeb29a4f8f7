//! Completion Backend Integration
//!
//! Abstracted access to language-model providers through two trait
//! capabilities, [`CompletionBackend`] and [`ResearchBackend`].
//!
//! # Available Backends
//!
//! - **OpenAI**: Chat Completions for plain completions, Responses with web
//!   search for research
//! - **Ollama**: Local completions only
//!
//! # Usage
//!
//! ```ignore
//! use router_core::backend::{CompletionBackend, CompletionRequest, OpenAiBackend};
//!
//! let backend = OpenAiBackend::new(base_url, api_key, research_model, timeout)?;
//! let response = backend.complete(&CompletionRequest::new("Hello!", "gpt-4o-mini")).await?;
//! ```

mod ollama;
mod openai;
mod traits;

pub use ollama::{
    OllamaBackend, DEFAULT_HOST as DEFAULT_OLLAMA_HOST, DEFAULT_PORT as DEFAULT_OLLAMA_PORT,
};
pub use openai::{OpenAiBackend, DEFAULT_BASE_URL, DEFAULT_RESEARCH_MODEL};
pub use traits::{
    BackendError, CompletionBackend, CompletionRequest, CompletionResponse, ResearchBackend,
};
