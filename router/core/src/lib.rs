//! Router Core - Cache-and-Pipeline Query Routing
//!
//! Routes each natural-language query down one of two paths:
//! an exact-match lookup in a pair of append-only logs, or a staged
//! triage → compression → research → expansion pipeline whose result is
//! written back so the next identical query becomes a cache hit.
//!
//! # Architecture
//!
//! ```text
//!                    query
//!                      │
//! ┌────────────────────┼───────────────────────────────────────────┐
//! │                QueryRouter                                     │
//! │   ┌──────────┐     │      ┌───────────────┐                    │
//! │   │ LogPair  │─────┴─────▶│ ResponseCache │── hit ──▶ answer   │
//! │   │(BlockStore)           └───────┬───────┘                    │
//! │   └────▲─────┘                    │ miss                       │
//! │        │                  ┌───────▼────────┐                   │
//! │        └── write-back ────│    Pipeline    │── direct ─▶ answer│
//! │                           └───────┬────────┘                   │
//! └───────────────────────────────────┼────────────────────────────┘
//!                                     │
//!                 CompletionBackend / ResearchBackend
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use router_core::{load_config, OpenAiBackend, QueryRouter};
//!
//! let config = load_config(None).await?;
//! let backend = OpenAiBackend::new(
//!     &config.base_url,
//!     config.require_api_key()?,
//!     &config.research_model,
//!     config.timeout,
//! )?;
//! let router = QueryRouter::new(config.router_settings(), backend.clone(), backend);
//! let answer = router.answer("How do vaccines train the immune system?").await?;
//! println!("{}", answer.text);
//! ```
//!
//! # Module Overview
//!
//! - [`normalize`]: canonical text form for cache keys
//! - [`store`]: delimiter-separated block logs
//! - [`cache`]: exact-match response cache
//! - [`pipeline`]: staged compression/research/expansion
//! - [`backend`]: completion providers (OpenAI, Ollama)
//! - [`router`]: the orchestrator tying them together
//! - [`config`]: TOML/environment configuration

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod cache;
pub mod config;
pub mod normalize;
pub mod pipeline;
pub mod router;
pub mod store;

// Re-exports for convenience
pub use backend::{
    BackendError, CompletionBackend, CompletionRequest, CompletionResponse, OllamaBackend,
    OpenAiBackend, ResearchBackend,
};
pub use cache::{CacheError, MisalignmentPolicy, ResponseCache};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, Provider, RouterConfig, RouterToml,
};
pub use normalize::normalize;
pub use pipeline::{
    total_tokens, Pipeline, PipelineError, PipelineOutcome, PipelineRun, Stage, StageModels,
    StageUsage,
};
pub use router::{
    answer_from_cache, QueryRouter, Route, RoutedAnswer, RouterError, RouterSettings,
};
pub use store::{BlockStore, LogPair, StoreError, DEFAULT_DELIMITER};
