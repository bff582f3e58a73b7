//! ScholarLens Common Library
//!
//! Shared code for the ScholarLens gateway:
//! - Dataset snapshot loading and indexing
//! - Aggregations and network graph builders
//! - Query tool registry and chart specs
//! - Agent loop over a reasoning provider
//! - Error types, configuration, metrics

pub mod agent;
pub mod analytics;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod graph;
pub mod metrics;
pub mod tools;

// Re-export commonly used types
pub use agent::{AgentLoop, ChatResponse, ReasoningProvider};
pub use config::AppConfig;
pub use dataset::Dataset;
pub use errors::{AppError, Result};
pub use tools::ToolRegistry;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
