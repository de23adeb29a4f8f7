//! Query Router - The Orchestration Core
//!
//! Answers one query per call:
//!
//! 1. Load both logs and build the [`ResponseCache`]
//! 2. Look up the cache with the normalized query; on a hit return the stored
//!    response without calling any backend
//! 3. On a miss run the [`Pipeline`]
//! 4. A direct triage answer is returned as-is; an expanded answer is
//!    appended to both logs at the same index, then returned. An expanded
//!    answer that cannot be stored as one block is returned uncached.
//!
//! The router holds no state between calls beyond the log files.
//! [`answer_from_cache`] runs steps 1 and 2 alone, with no backends, so a
//! caller can skip building clients for a cache hit.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::backend::{CompletionBackend, ResearchBackend};
use crate::cache::{CacheError, MisalignmentPolicy, ResponseCache};
use crate::pipeline::{
    total_tokens, Pipeline, PipelineError, PipelineOutcome, PipelineRun, StageModels, StageUsage,
};
use crate::store::{canonical_block, validate_block, LogPair, StoreError};

/// Errors surfaced by [`QueryRouter::answer`]
#[derive(Debug, Error)]
pub enum RouterError {
    /// The query is empty after trimming
    #[error("Query is empty")]
    EmptyQuery,

    /// Log read or write failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The logs could not be paired
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A pipeline stage failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Which path produced an answer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Served from the logs
    CacheHit,
    /// Triage answered directly; nothing written
    Direct,
    /// Full pipeline ran; answer written back
    Pipeline,
    /// Full pipeline ran; answer could not be stored as one block
    Uncached,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheHit => write!(f, "cache-hit"),
            Self::Direct => write!(f, "direct"),
            Self::Pipeline => write!(f, "pipeline"),
            Self::Uncached => write!(f, "uncached"),
        }
    }
}

/// An answer and the route that produced it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutedAnswer {
    /// Answer text
    pub text: String,
    /// Route taken
    pub route: Route,
    /// Per-stage cost; empty for a cache hit
    pub usage: Vec<StageUsage>,
}

impl RoutedAnswer {
    fn cache_hit(text: &str) -> Self {
        Self {
            text: text.to_string(),
            route: Route::CacheHit,
            usage: Vec::new(),
        }
    }

    /// Tokens spent across all stages, if any were reported
    #[must_use]
    pub fn total_tokens(&self) -> Option<u32> {
        total_tokens(&self.usage)
    }
}

/// Everything the router needs besides its backends
#[derive(Clone, Debug)]
pub struct RouterSettings {
    /// Query log path
    pub query_log: PathBuf,
    /// Response log path
    pub response_log: PathBuf,
    /// Block delimiter
    pub delimiter: String,
    /// Policy for logs of different lengths
    pub misaligned: MisalignmentPolicy,
    /// Models for the plain completion stages
    pub models: StageModels,
}

impl RouterSettings {
    fn log_pair(&self) -> LogPair {
        LogPair::new(
            self.query_log.clone(),
            self.response_log.clone(),
            &self.delimiter,
        )
    }
}

fn check_query(query: &str, delimiter: &str) -> Result<(), RouterError> {
    if query.trim().is_empty() {
        return Err(RouterError::EmptyQuery);
    }
    // A query that cannot be stored never reaches the pipeline
    validate_block(query, delimiter)?;
    Ok(())
}

async fn build_cache(
    logs: &LogPair,
    misaligned: MisalignmentPolicy,
) -> Result<ResponseCache, RouterError> {
    let (queries, responses) = logs.load().await?;
    let cache = ResponseCache::build(&queries, &responses, misaligned)?;
    tracing::debug!(entries = cache.len(), "Cache built");
    Ok(cache)
}

/// Look `query` up in the logs without any backend
///
/// Returns `None` on a miss. Applies the same query checks as
/// [`QueryRouter::answer`].
///
/// # Errors
///
/// Fails on an empty or unstorable query, a missing or unreadable log, or
/// misaligned logs under `MisalignmentPolicy::Reject`.
pub async fn answer_from_cache(
    settings: &RouterSettings,
    query: &str,
) -> Result<Option<RoutedAnswer>, RouterError> {
    check_query(query, &settings.delimiter)?;

    let cache = build_cache(&settings.log_pair(), settings.misaligned).await?;
    let hit = cache.lookup(query).map(RoutedAnswer::cache_hit);
    if hit.is_some() {
        tracing::info!(route = %Route::CacheHit, "Answered from cache");
    }
    Ok(hit)
}

/// Cache-then-pipeline query router
pub struct QueryRouter<C: CompletionBackend, R: ResearchBackend> {
    logs: LogPair,
    misaligned: MisalignmentPolicy,
    pipeline: Pipeline<C, R>,
}

impl<C: CompletionBackend, R: ResearchBackend> QueryRouter<C, R> {
    /// Create a router with the given backends
    pub fn new(settings: RouterSettings, completion: C, research: R) -> Self {
        Self::with_shared(settings, Arc::new(completion), Arc::new(research))
    }

    /// Create a router from shared backends
    pub fn with_shared(settings: RouterSettings, completion: Arc<C>, research: Arc<R>) -> Self {
        Self {
            logs: settings.log_pair(),
            misaligned: settings.misaligned,
            pipeline: Pipeline::new(completion, research, settings.models),
        }
    }

    /// The log files this router reads and appends
    #[must_use]
    pub fn logs(&self) -> &LogPair {
        &self.logs
    }

    /// Build the cache from the current logs
    ///
    /// # Errors
    ///
    /// Fails if a log is missing or unreadable, or if the logs are misaligned
    /// under `MisalignmentPolicy::Reject`.
    pub async fn load_cache(&self) -> Result<ResponseCache, RouterError> {
        build_cache(&self.logs, self.misaligned).await
    }

    /// Answer one query
    ///
    /// # Errors
    ///
    /// Any store, cache or pipeline failure is returned; no fallback answer
    /// is ever produced.
    pub async fn answer(&self, query: &str) -> Result<RoutedAnswer, RouterError> {
        check_query(query, self.logs.queries.delimiter())?;

        let span = tracing::info_span!("query", request_id = %Uuid::new_v4());
        self.answer_inner(query).instrument(span).await
    }

    async fn answer_inner(&self, query: &str) -> Result<RoutedAnswer, RouterError> {
        let cache = self.load_cache().await?;

        if let Some(response) = cache.lookup(query) {
            tracing::info!(route = %Route::CacheHit, "Answered from cache");
            return Ok(RoutedAnswer::cache_hit(response));
        }
        drop(cache);

        tracing::info!("Cache miss, running pipeline");
        let PipelineRun { outcome, usage } = self.pipeline.run(query).await?;

        match outcome {
            PipelineOutcome::Direct(text) => Ok(RoutedAnswer {
                text,
                route: Route::Direct,
                usage,
            }),
            PipelineOutcome::Expanded(text) => {
                let stored_query = canonical_block(query);
                let stored_answer = canonical_block(&text);

                if let Err(e) = validate_block(&stored_answer, self.logs.responses.delimiter()) {
                    tracing::warn!(
                        route = %Route::Uncached,
                        error = %e,
                        "Answer cannot be stored as one block, not caching it"
                    );
                    return Ok(RoutedAnswer {
                        text: stored_answer,
                        route: Route::Uncached,
                        usage,
                    });
                }

                self.logs.append_pair(&stored_query, &stored_answer).await?;
                tracing::info!(route = %Route::Pipeline, "Answer written back to logs");

                Ok(RoutedAnswer {
                    text: stored_answer,
                    route: Route::Pipeline,
                    usage,
                })
            }
        }
    }
}
