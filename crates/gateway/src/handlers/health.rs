//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
    pub llm_configured: bool,
    pub model: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub dataset: DatasetCheck,
}

#[derive(Serialize)]
pub struct DatasetCheck {
    pub status: String,
    pub papers: usize,
    pub references: usize,
    pub authors: usize,
    pub affiliations: usize,
    /// Rows discarded at load (dangling or duplicate)
    pub dropped_rows: usize,
}

/// Liveness check - always returns healthy if server is running
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: scholarlens_common::VERSION,
        llm_configured: state.config.llm.has_api_key(),
        model: state.agent.model_name().to_string(),
    })
}

/// Readiness check - the snapshot is loaded before binding, so this reports its shape
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let report = state.dataset.load_report();
    let dropped_rows = report.duplicate_papers
        + report.duplicate_authors
        + report.dangling_references
        + report.dangling_affiliations
        + report.duplicate_affiliations
        + report.malformed_rows;

    Json(ReadyResponse {
        status: "ready".to_string(),
        checks: HealthChecks {
            dataset: DatasetCheck {
                status: if state.dataset.is_empty() { "empty" } else { "up" }.to_string(),
                papers: report.papers,
                references: report.references,
                authors: report.authors,
                affiliations: report.affiliations,
                dropped_rows,
            },
        },
    })
}
