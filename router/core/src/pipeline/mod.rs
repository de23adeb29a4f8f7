//! Compression / Research / Expansion Pipeline
//!
//! Runs only on a cache miss. Stages execute strictly in order, each waiting
//! for the previous completion:
//!
//! ```text
//!   query
//!     │
//!     ▼
//! ┌─────────┐  "0..."   ┌──────────────────┐
//! │ TRIAGE  │──────────▶│ Direct (no cache)│
//! └────┬────┘           └──────────────────┘
//!      │ key terms
//!      ▼
//! ┌──────────┐   ┌──────────┐   ┌─────────┐   ┌───────────────────┐
//! │ COMPRESS │──▶│ RESEARCH │──▶│ EXPAND  │──▶│ Expanded (cached) │
//! └──────────┘   └──────────┘   └─────────┘   └───────────────────┘
//! ```
//!
//! A failed completion ends the run; there are no retries and no partial
//! output. The pipeline itself never touches the logs.

pub mod prompts;
pub mod triage;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::backend::{
    BackendError, CompletionBackend, CompletionRequest, CompletionResponse, ResearchBackend,
};
use triage::{parse_triage, Triage};

/// Default model for the triage, compression and expansion stages
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";

/// Pipeline stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Classify and extract key terms
    Triage,
    /// Keep the most central terms
    Compress,
    /// Research key points with live retrieval
    Research,
    /// Expand key points into the final answer
    Expand,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Triage => write!(f, "triage"),
            Self::Compress => write!(f, "compress"),
            Self::Research => write!(f, "research"),
            Self::Expand => write!(f, "expand"),
        }
    }
}

/// Pipeline failures, tagged with the stage that failed
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The stage's completion call failed
    #[error("{stage} stage completion failed: {source}")]
    Completion {
        /// Failing stage
        stage: Stage,
        /// Backend error
        #[source]
        source: BackendError,
    },

    /// The stage returned text that does not fit the expected shape
    #[error("{stage} stage returned a non-conforming response: {reason}")]
    MisalignedResponse {
        /// Failing stage
        stage: Stage,
        /// What was wrong
        reason: String,
    },
}

impl PipelineError {
    /// Stage that failed
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Completion { stage, .. } | Self::MisalignedResponse { stage, .. } => *stage,
        }
    }
}

/// Models for the plain-completion stages
#[derive(Clone, Debug, PartialEq)]
pub struct StageModels {
    /// Triage model
    pub triage: String,
    /// Compression model
    pub compress: String,
    /// Expansion model
    pub expand: String,
    /// Sampling temperature for these stages, provider default when `None`
    pub temperature: Option<f32>,
}

impl Default for StageModels {
    fn default() -> Self {
        Self {
            triage: DEFAULT_COMPLETION_MODEL.to_string(),
            compress: DEFAULT_COMPLETION_MODEL.to_string(),
            expand: DEFAULT_COMPLETION_MODEL.to_string(),
            temperature: None,
        }
    }
}

/// What one stage call cost
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageUsage {
    /// Stage that made the call
    pub stage: Stage,
    /// Model that answered
    pub model: String,
    /// Tokens reported by the provider
    pub tokens_used: Option<u32>,
    /// Round-trip time in milliseconds
    pub duration_ms: Option<u64>,
}

/// Sum of the reported tokens, `None` when no stage reported any
#[must_use]
pub fn total_tokens(usage: &[StageUsage]) -> Option<u32> {
    usage
        .iter()
        .filter_map(|u| u.tokens_used)
        .reduce(u32::saturating_add)
}

/// How a pipeline run ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Triage answered directly; not to be cached
    Direct(String),
    /// Full expansion; to be written back
    Expanded(String),
}

impl PipelineOutcome {
    /// The answer text
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Direct(text) | Self::Expanded(text) => text,
        }
    }
}

/// A finished run: the outcome plus one usage record per stage called
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineRun {
    /// How the run ended
    pub outcome: PipelineOutcome,
    /// Per-stage cost, in call order
    pub usage: Vec<StageUsage>,
}

/// The staged pipeline over two injected backends
pub struct Pipeline<C: CompletionBackend, R: ResearchBackend> {
    completion: Arc<C>,
    research: Arc<R>,
    models: StageModels,
}

impl<C: CompletionBackend, R: ResearchBackend> Pipeline<C, R> {
    /// Create a pipeline
    pub fn new(completion: Arc<C>, research: Arc<R>, models: StageModels) -> Self {
        Self {
            completion,
            research,
            models,
        }
    }

    /// Stage models
    #[must_use]
    pub fn models(&self) -> &StageModels {
        &self.models
    }

    /// Run every stage for `query`
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; later stages are not invoked.
    pub async fn run(&self, query: &str) -> Result<PipelineRun, PipelineError> {
        let mut usage = Vec::with_capacity(4);

        let triaged = self
            .complete(Stage::Triage, &self.models.triage, prompts::triage(query), &mut usage)
            .await?;

        let keywords = match parse_triage(&triaged) {
            Ok(Triage::Direct(answer)) => {
                tracing::info!("Triage answered directly, skipping pipeline");
                return Ok(PipelineRun {
                    outcome: PipelineOutcome::Direct(answer),
                    usage,
                });
            }
            Ok(Triage::Keywords(keywords)) => keywords,
            Err(reason) => {
                return Err(PipelineError::MisalignedResponse {
                    stage: Stage::Triage,
                    reason,
                })
            }
        };
        tracing::debug!(keywords = %keywords, "Triage extracted key terms");

        let compressed = self
            .complete(
                Stage::Compress,
                &self.models.compress,
                prompts::compress(&keywords),
                &mut usage,
            )
            .await?;
        tracing::debug!(compressed = %compressed, "Compressed key terms");

        let key_points = self.research(&compressed, &mut usage).await?;

        let expanded = self
            .complete(
                Stage::Expand,
                &self.models.expand,
                prompts::expand(&key_points),
                &mut usage,
            )
            .await?;
        tracing::info!(
            chars = expanded.len(),
            total_tokens = ?total_tokens(&usage),
            "Expansion complete"
        );

        Ok(PipelineRun {
            outcome: PipelineOutcome::Expanded(expanded),
            usage,
        })
    }

    async fn complete(
        &self,
        stage: Stage,
        model: &str,
        prompt: String,
        usage: &mut Vec<StageUsage>,
    ) -> Result<String, PipelineError> {
        tracing::debug!(%stage, model, backend = self.completion.name(), "Running stage");

        let mut request = CompletionRequest::new(prompt, model);
        if let Some(temperature) = self.models.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self
            .completion
            .complete(&request)
            .await
            .map_err(|source| PipelineError::Completion { stage, source })?;

        record_stage(stage, response, usage)
    }

    async fn research(
        &self,
        compressed: &str,
        usage: &mut Vec<StageUsage>,
    ) -> Result<String, PipelineError> {
        let stage = Stage::Research;
        tracing::debug!(%stage, backend = self.research.name(), "Running stage");

        let response = self
            .research
            .research(&prompts::research(compressed))
            .await
            .map_err(|source| PipelineError::Completion { stage, source })?;

        record_stage(stage, response, usage)
    }
}

fn record_stage(
    stage: Stage,
    response: CompletionResponse,
    usage: &mut Vec<StageUsage>,
) -> Result<String, PipelineError> {
    tracing::info!(
        %stage,
        model = %response.model,
        tokens = ?response.tokens_used,
        duration_ms = ?response.duration_ms,
        "Stage complete"
    );
    usage.push(StageUsage {
        stage,
        model: response.model,
        tokens_used: response.tokens_used,
        duration_ms: response.duration_ms,
    });

    require_text(stage, response.content)
}

fn require_text(stage: Stage, text: String) -> Result<String, PipelineError> {
    if text.trim().is_empty() {
        return Err(PipelineError::MisalignedResponse {
            stage,
            reason: "empty output".to_string(),
        });
    }
    Ok(text)
}
