//! hybrid-router - Answer one query through the cache-and-pipeline router
//!
//! Reads a single query from standard input (or `--query`), prints the answer
//! to standard output and logs to standard error.
//!
//! # Usage
//!
//! ```bash
//! # First run: create empty logs
//! hybrid-router --init
//!
//! # Ask a question
//! echo "How do mRNA vaccines work?" | hybrid-router
//!
//! # Custom logs and config
//! hybrid-router --config ./router.toml --query-log q.txt --response-log r.txt
//!
//! # Verbose logging
//! RUST_LOG=debug hybrid-router --query "What is a monad?"
//! ```
//!
//! # Exit Codes
//!
//! - `0`: answer printed
//! - non-zero: configuration, log or completion failure (reported on stderr)

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use router_core::{
    answer_from_cache, load_config, CompletionBackend, ConfigOverrides, LogPair,
    MisalignmentPolicy, OllamaBackend, OpenAiBackend, Provider, QueryRouter, ResearchBackend,
    RoutedAnswer, RouterConfig,
};

/// hybrid-router - Cost-aware cache-and-pipeline question answering
#[derive(Parser, Debug)]
#[command(name = "hybrid-router")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Query text (read from stdin when omitted)
    #[arg(short = 'q', long)]
    query: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "HYBRID_ROUTER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Query log path
    #[arg(long, value_name = "PATH")]
    query_log: Option<PathBuf>,

    /// Response log path
    #[arg(long, value_name = "PATH")]
    response_log: Option<PathBuf>,

    /// Block delimiter token
    #[arg(long, value_name = "TOKEN")]
    delimiter: Option<String>,

    /// Policy when the logs have different lengths (truncate, reject)
    #[arg(long, value_name = "POLICY")]
    misaligned: Option<MisalignmentPolicy>,

    /// Provider for triage, compression and expansion (openai, ollama)
    #[arg(long, value_name = "PROVIDER")]
    provider: Option<Provider>,

    /// Create empty log files if they do not exist, then exit
    #[arg(long)]
    init: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "HYBRID_ROUTER_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            query_log: self.query_log.clone(),
            response_log: self.response_log.clone(),
            delimiter: self.delimiter.clone(),
            misaligned: self.misaligned,
            provider: self.provider,
        }
    }
}

fn stdin_is_terminal() -> bool {
    std::io::stdin().is_terminal()
}

/// Read the query from stdin
async fn read_query() -> Result<String> {
    if stdin_is_terminal() {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(b"Please enter your query: ").await?;
        stderr.flush().await?;

        let mut line = String::new();
        let mut reader = tokio::io::BufReader::new(tokio::io::stdin());
        reader
            .read_line(&mut line)
            .await
            .context("Failed to read query from stdin")?;
        return Ok(line);
    }

    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("Failed to read query from stdin")?;
    Ok(input)
}

/// Print the answer to stdout
async fn print_answer(answer: &RoutedAnswer) -> Result<()> {
    info!(
        route = %answer.route,
        total_tokens = ?answer.total_tokens(),
        "Answered"
    );

    let mut stdout = tokio::io::stdout();
    stdout.write_all(answer.text.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Route one query through the backends and print the answer
async fn answer_with<C, R>(
    config: &RouterConfig,
    completion: C,
    research: R,
    query: &str,
) -> Result<()>
where
    C: CompletionBackend,
    R: ResearchBackend,
{
    let router = QueryRouter::new(config.router_settings(), completion, research);
    let answer = router.answer(query).await?;
    print_answer(&answer).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries only the answer
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&args.log_level).context("Invalid log level")?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let mut config = load_config(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate()?;
    debug!(config = ?config, source = %config.source(), "Configuration resolved");

    if args.init {
        let settings = config.router_settings();
        LogPair::new(&settings.query_log, &settings.response_log, &settings.delimiter)
            .create_if_missing()
            .await
            .context("Failed to create log files")?;
        info!(
            queries = %settings.query_log.display(),
            responses = %settings.response_log.display(),
            "Logs ready"
        );
        return Ok(());
    }

    let query = match args.query {
        Some(ref query) => query.clone(),
        None => read_query().await?,
    };

    // A cache hit needs no credentials or clients
    if let Some(answer) = answer_from_cache(&config.router_settings(), &query).await? {
        return print_answer(&answer).await;
    }

    // Research always runs on the hosted API
    let research = OpenAiBackend::new(
        &config.base_url,
        config.require_api_key()?,
        &config.research_model,
        config.timeout,
    )
    .context("Failed to create OpenAI backend")?;

    match config.provider {
        Provider::OpenAi => answer_with(&config, research.clone(), research, &query).await,
        Provider::Ollama => {
            let completion =
                OllamaBackend::new(&config.ollama_host, config.ollama_port, config.timeout)
                    .context("Failed to create Ollama backend")?;
            answer_with(&config, completion, research, &query).await
        }
    }
}
