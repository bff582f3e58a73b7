//! Configuration management for ScholarLens
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Dataset snapshot location
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// External reasoning service configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Agent loop limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Graph payload limits
    #[serde(default)]
    pub graph: GraphConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Grace period for in-flight requests after a shutdown signal, in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetConfig {
    /// Directory holding the four table files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_papers_file")]
    pub papers_file: String,

    #[serde(default = "default_references_file")]
    pub references_file: String,

    #[serde(default = "default_authors_file")]
    pub authors_file: String,

    #[serde(default = "default_affiliations_file")]
    pub affiliations_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Reasoning provider: anthropic, offline
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key for the reasoning service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    #[serde(default = "default_llm_api_base")]
    pub api_base: String,

    /// Model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Maximum output tokens per reasoning call
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    /// Per-call timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Retries for retryable failures (on top of the first attempt)
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,

    /// First retry delay in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Maximum reasoning <-> tool-call cycles per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Wall-clock bound for a whole chat turn in seconds
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    #[serde(default = "default_max_nodes")]
    pub default_max_nodes: usize,

    #[serde(default = "default_max_authors")]
    pub default_max_authors: usize,

    /// Upper bound accepted for max_nodes / max_authors
    #[serde(default = "default_max_graph_size")]
    pub max_graph_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (process wide)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_papers_file() -> String { "papers.json".to_string() }
fn default_references_file() -> String { "paper_refs.json".to_string() }
fn default_authors_file() -> String { "authors.json".to_string() }
fn default_affiliations_file() -> String { "paper_author_affiliation.json".to_string() }
fn default_llm_provider() -> String { "anthropic".to_string() }
fn default_llm_api_base() -> String { "https://api.anthropic.com/v1".to_string() }
fn default_llm_model() -> String { "claude-sonnet-4-20250514".to_string() }
fn default_llm_max_tokens() -> u32 { 4096 }
fn default_llm_timeout() -> u64 { 30 }
fn default_llm_retries() -> u32 { 2 }
fn default_initial_backoff() -> u64 { 250 }
fn default_max_iterations() -> usize { 5 }
fn default_turn_timeout() -> u64 { 90 }
fn default_max_nodes() -> usize { 200 }
fn default_max_authors() -> usize { 150 }
fn default_max_graph_size() -> usize { 10_000 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl DatasetConfig {
    pub fn papers_path(&self) -> PathBuf {
        self.data_dir.join(&self.papers_file)
    }

    pub fn references_path(&self) -> PathBuf {
        self.data_dir.join(&self.references_file)
    }

    pub fn authors_path(&self) -> PathBuf {
        self.data_dir.join(&self.authors_file)
    }

    pub fn affiliations_path(&self) -> PathBuf {
        self.data_dir.join(&self.affiliations_file)
    }
}

impl LlmConfig {
    /// Per-call timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether a usable API key is present
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().map_or(false, |k| !k.trim().is_empty())
    }
}

impl AgentConfig {
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            papers_file: default_papers_file(),
            references_file: default_references_file(),
            authors_file: default_authors_file(),
            affiliations_file: default_affiliations_file(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: default_llm_api_base(),
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_llm_retries(),
            initial_backoff_ms: default_initial_backoff(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            turn_timeout_secs: default_turn_timeout(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_max_nodes: default_max_nodes(),
            default_max_authors: default_max_authors(),
            max_graph_size: default_max_graph_size(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            dataset: DatasetConfig::default(),
            llm: LlmConfig::default(),
            agent: AgentConfig::default(),
            graph: GraphConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
