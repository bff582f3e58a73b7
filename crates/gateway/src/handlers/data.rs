//! Query tool handlers
//!
//! Each `/api/data/*` route runs one tool with its query string as the
//! argument object, so the HTTP surface and the agent share one validation
//! path.

use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::parse_query;
use crate::AppState;
use scholarlens_common::{
    errors::{AppError, Result},
    tools::{ToolDefinition, ToolEnvelope, ToolName, ToolRequest},
};

type RawQuery = std::result::Result<Query<HashMap<String, String>>, QueryRejection>;

/// Query strings are untyped; read numbers and booleans as JSON scalars
fn arguments_from_query(params: HashMap<String, String>) -> Value {
    let args = params
        .into_iter()
        .map(|(key, raw)| {
            let value = match raw.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => match raw.parse::<i64>() {
                    Ok(n) => Value::from(n),
                    Err(_) => Value::String(raw),
                },
            };
            (key, value)
        })
        .collect::<Map<String, Value>>();
    Value::Object(args)
}

fn run_tool(state: &AppState, tool: ToolName, query: RawQuery) -> Result<Json<ToolEnvelope>> {
    let args = arguments_from_query(parse_query(query)?);
    let request = ToolRequest::parse(tool.as_str(), args)?;
    Ok(Json(state.tools.execute(&request)?))
}

pub async fn papers_by_year(State(state): State<AppState>, query: RawQuery) -> Result<Json<ToolEnvelope>> {
    run_tool(&state, ToolName::PapersByYear, query)
}

pub async fn top_authors(State(state): State<AppState>, query: RawQuery) -> Result<Json<ToolEnvelope>> {
    run_tool(&state, ToolName::TopAuthors, query)
}

pub async fn citation_stats(State(state): State<AppState>, query: RawQuery) -> Result<Json<ToolEnvelope>> {
    run_tool(&state, ToolName::CitationStats, query)
}

pub async fn collaboration_stats(State(state): State<AppState>, query: RawQuery) -> Result<Json<ToolEnvelope>> {
    run_tool(&state, ToolName::CollaborationStats, query)
}

pub async fn yearly_trend(State(state): State<AppState>, query: RawQuery) -> Result<Json<ToolEnvelope>> {
    run_tool(&state, ToolName::YearlyTrend, query)
}

pub async fn patent_histogram(State(state): State<AppState>, query: RawQuery) -> Result<Json<ToolEnvelope>> {
    run_tool(&state, ToolName::PatentHistogram, query)
}

pub async fn papers_with_filters(State(state): State<AppState>, query: RawQuery) -> Result<Json<ToolEnvelope>> {
    run_tool(&state, ToolName::PapersWithFilters, query)
}

/// Tool catalogue as offered to the reasoning service
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolDefinition>> {
    Json(state.tools.definitions())
}

/// Run any tool by name with a JSON argument object
pub async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ToolEnvelope>> {
    let Json(args) = body.map_err(|rejection| AppError::InvalidRequest {
        message: rejection.body_text(),
        field: None,
    })?;
    let request = ToolRequest::parse(&name, args)?;
    Ok(Json(state.tools.execute(&request)?))
}
