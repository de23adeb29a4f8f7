//! TOML Configuration File Support
//!
//! Centralized configuration loading for the router, supporting a TOML file at
//! `~/.config/hybrid-router/router.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [logs]
//! query_path = "/var/lib/hybrid-router/queries.txt"
//! response_path = "/var/lib/hybrid-router/responses.txt"
//! delimiter = "`"
//! misaligned = "truncate"
//!
//! [models]
//! triage = "gpt-4o-mini"
//! compress = "gpt-4o-mini"
//! expand = "gpt-4o-mini"
//! research = "o4-mini-deep-research"
//! temperature = 0.7
//!
//! [backend]
//! provider = "openai"
//! base_url = "https://api.openai.com/v1"
//! api_key_env = "OPENAI_API_KEY"
//! timeout_secs = 600
//! ```
//!
//! # Environment Variables
//!
//! - `HYBRID_ROUTER_QUERY_LOG`, `HYBRID_ROUTER_RESPONSE_LOG`: log paths
//! - `HYBRID_ROUTER_DELIMITER`: block delimiter
//! - `HYBRID_ROUTER_PROVIDER`: `openai` or `ollama`
//! - `OPENAI_API_KEY` (or the variable named by `api_key_env`): API key
//! - `OLLAMA_HOST`, `OLLAMA_PORT`: local Ollama server

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{
    DEFAULT_BASE_URL, DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_PORT, DEFAULT_RESEARCH_MODEL,
};
use crate::cache::MisalignmentPolicy;
use crate::pipeline::StageModels;
use crate::router::RouterSettings;
use crate::store::DEFAULT_DELIMITER;

/// Default query log path
pub const DEFAULT_QUERY_LOG: &str = "queries.txt";

/// Default response log path
pub const DEFAULT_RESPONSE_LOG: &str = "responses.txt";

/// Default environment variable holding the API key
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default overall request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// No API key available for the hosted backend
    #[error("No API key found (set {env})")]
    MissingApiKey {
        /// Environment variable that was checked
        env: String,
    },
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Provider for the triage, compression and expansion stages
///
/// Research always goes to the hosted API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Hosted OpenAI API
    #[default]
    OpenAi,
    /// Local Ollama server
    Ollama,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown provider '{other}' (expected 'openai' or 'ollama')")),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Logs section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsToml {
    /// Query log path
    pub query_path: Option<PathBuf>,

    /// Response log path
    pub response_path: Option<PathBuf>,

    /// Block delimiter token
    pub delimiter: Option<String>,

    /// Policy for logs of different lengths
    pub misaligned: Option<MisalignmentPolicy>,
}

/// Models section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsToml {
    /// Triage model
    pub triage: Option<String>,

    /// Compression model
    pub compress: Option<String>,

    /// Expansion model
    pub expand: Option<String>,

    /// Research model
    pub research: Option<String>,

    /// Sampling temperature for triage, compression and expansion
    pub temperature: Option<f32>,
}

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Provider for the plain completion stages
    pub provider: Option<Provider>,

    /// Hosted API base URL
    pub base_url: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Ollama host
    pub ollama_host: Option<String>,

    /// Ollama port
    pub ollama_port: Option<u16>,

    /// Overall request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterToml {
    /// Logs section
    pub logs: LogsToml,

    /// Models section
    pub models: ModelsToml,

    /// Backend section
    pub backend: BackendToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved router configuration
#[derive(Clone)]
pub struct RouterConfig {
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

    /// Research model
    pub research_model: String,

    /// Provider for the plain completion stages
    pub provider: Provider,

    /// Hosted API base URL
    pub base_url: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// API key, if found
    pub api_key: Option<String>,

    /// Ollama host
    pub ollama_host: String,

    /// Ollama port
    pub ollama_port: u16,

    /// Overall request timeout
    pub timeout: Duration,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("query_log", &self.query_log)
            .field("response_log", &self.response_log)
            .field("delimiter", &self.delimiter)
            .field("misaligned", &self.misaligned)
            .field("models", &self.models)
            .field("research_model", &self.research_model)
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            query_log: PathBuf::from(DEFAULT_QUERY_LOG),
            response_log: PathBuf::from(DEFAULT_RESPONSE_LOG),
            delimiter: DEFAULT_DELIMITER.to_string(),
            misaligned: MisalignmentPolicy::default(),
            models: StageModels::default(),
            research_model: DEFAULT_RESEARCH_MODEL.to_string(),
            provider: Provider::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_key: None,
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            ollama_port: DEFAULT_OLLAMA_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl RouterConfig {
    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check values that cannot be expressed in the types
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let delimiter = self.delimiter.trim();
        if delimiter.is_empty() {
            return Err(ConfigError::ValidationError(
                "delimiter must not be blank".to_string(),
            ));
        }
        if delimiter != self.delimiter || self.delimiter.contains('\n') {
            return Err(ConfigError::ValidationError(format!(
                "delimiter {:?} must be a single token without surrounding whitespace",
                self.delimiter
            )));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        let models = [
            &self.models.triage,
            &self.models.compress,
            &self.models.expand,
            &self.research_model,
        ];
        if models.iter().any(|m| m.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "model names must not be empty".to_string(),
            ));
        }
        if let Some(temperature) = self.models.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "temperature {temperature} must be between 0.0 and 2.0"
                )));
            }
        }
        Ok(())
    }

    /// API key for the hosted backend
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingApiKey` if none was configured.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                env: self.api_key_env.clone(),
            })
    }

    /// Settings for constructing a [`QueryRouter`](crate::QueryRouter)
    #[must_use]
    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            query_log: self.query_log.clone(),
            response_log: self.response_log.clone(),
            delimiter: self.delimiter.clone(),
            misaligned: self.misaligned,
            models: self.models.clone(),
        }
    }
}

// =============================================================================
// CLI Overrides
// =============================================================================

/// Values supplied on the command line
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Query log path
    pub query_log: Option<PathBuf>,
    /// Response log path
    pub response_log: Option<PathBuf>,
    /// Block delimiter
    pub delimiter: Option<String>,
    /// Misalignment policy
    pub misaligned: Option<MisalignmentPolicy>,
    /// Provider
    pub provider: Option<Provider>,
}

impl ConfigOverrides {
    /// Apply overrides on top of a loaded configuration
    pub fn apply(&self, config: &mut RouterConfig) {
        let mut applied = false;

        if let Some(ref path) = self.query_log {
            config.query_log = path.clone();
            applied = true;
        }
        if let Some(ref path) = self.response_log {
            config.response_log = path.clone();
            applied = true;
        }
        if let Some(ref delimiter) = self.delimiter {
            config.delimiter = delimiter.clone();
            applied = true;
        }
        if let Some(policy) = self.misaligned {
            config.misaligned = policy;
            applied = true;
        }
        if let Some(provider) = self.provider {
            config.provider = provider;
            applied = true;
        }

        if applied {
            config.source = ConfigSource::Cli;
        }
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/hybrid-router/router.toml` or
/// `~/.config/hybrid-router/router.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hybrid-router").join("router.toml"))
}

/// Load configuration from file and environment
///
/// With `explicit` set, that file must exist. Otherwise the default path is
/// used when present and defaults apply when it is not.
///
/// # Errors
///
/// Returns an error if a config file cannot be read or parsed.
pub async fn load_config(explicit: Option<&Path>) -> Result<RouterConfig, ConfigError> {
    match explicit {
        Some(path) => load_config_from_path(path, true).await,
        None => match default_config_path() {
            Some(path) => load_config_from_path(&path, false).await,
            None => {
                let mut config = RouterConfig::default();
                apply_env_config(&mut config, |key| std::env::var(key).ok());
                Ok(config)
            }
        },
    }
}

/// Load configuration from a specific path, then apply the environment
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if it is
/// missing and `must_exist` is set.
pub async fn load_config_from_path(
    path: &Path,
    must_exist: bool,
) -> Result<RouterConfig, ConfigError> {
    let mut config = RouterConfig::default();

    match tokio::fs::read_to_string(path).await {
        Ok(toml_content) => {
            let toml_config: RouterToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(path.to_path_buf());
            config.source = ConfigSource::File;

            tracing::info!(path = %path.display(), "Loaded configuration from file");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !must_exist => {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        }
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Apply TOML configuration values to the config struct
pub fn apply_toml_config(config: &mut RouterConfig, toml: &RouterToml) {
    if let Some(ref path) = toml.logs.query_path {
        config.query_log = path.clone();
    }
    if let Some(ref path) = toml.logs.response_path {
        config.response_log = path.clone();
    }
    if let Some(ref delimiter) = toml.logs.delimiter {
        config.delimiter = delimiter.clone();
    }
    if let Some(policy) = toml.logs.misaligned {
        config.misaligned = policy;
    }

    if let Some(ref model) = toml.models.triage {
        config.models.triage = model.clone();
    }
    if let Some(ref model) = toml.models.compress {
        config.models.compress = model.clone();
    }
    if let Some(ref model) = toml.models.expand {
        config.models.expand = model.clone();
    }
    if let Some(ref model) = toml.models.research {
        config.research_model = model.clone();
    }
    if let Some(temperature) = toml.models.temperature {
        config.models.temperature = Some(temperature);
    }

    if let Some(provider) = toml.backend.provider {
        config.provider = provider;
    }
    if let Some(ref url) = toml.backend.base_url {
        config.base_url = url.clone();
    }
    if let Some(ref env) = toml.backend.api_key_env {
        config.api_key_env = env.clone();
    }
    if let Some(ref host) = toml.backend.ollama_host {
        config.ollama_host = host.clone();
    }
    if let Some(port) = toml.backend.ollama_port {
        config.ollama_port = port;
    }
    if let Some(secs) = toml.backend.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }
}

/// Apply environment variables, looked up through `var`
pub fn apply_env_config<F>(config: &mut RouterConfig, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = false;

    if let Some(path) = var("HYBRID_ROUTER_QUERY_LOG") {
        config.query_log = PathBuf::from(path);
        applied = true;
    }
    if let Some(path) = var("HYBRID_ROUTER_RESPONSE_LOG") {
        config.response_log = PathBuf::from(path);
        applied = true;
    }
    if let Some(delimiter) = var("HYBRID_ROUTER_DELIMITER") {
        config.delimiter = delimiter;
        applied = true;
    }
    if let Some(provider) = var("HYBRID_ROUTER_PROVIDER") {
        match provider.parse() {
            Ok(provider) => {
                config.provider = provider;
                applied = true;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring HYBRID_ROUTER_PROVIDER"),
        }
    }
    if let Some(host) = var("OLLAMA_HOST") {
        config.ollama_host = host;
        applied = true;
    }
    if let Some(port) = var("OLLAMA_PORT") {
        match port.parse() {
            Ok(port) => {
                config.ollama_port = port;
                applied = true;
            }
            Err(_) => tracing::warn!(value = %port, "Ignoring invalid OLLAMA_PORT"),
        }
    }

    // The key is never read from the file, only from the named variable
    config.api_key = var(&config.api_key_env);

    if applied {
        config.source = ConfigSource::Env;
    }
}
