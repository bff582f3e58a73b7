//! Dashboard handlers: network graphs, timeline, patent histogram, per-year listings

use axum::{
    extract::{rejection::{PathRejection, QueryRejection}, Path, Query, State},
    Json,
};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use super::parse_query;
use crate::AppState;
use scholarlens_common::{
    analytics::{self, PatentBucket, PaperSummary, TimelineEntry, YearRange, DEFAULT_YEAR_LISTING_LIMIT},
    errors::{AppError, Result},
    graph::{self, CitationGraph, CitationGraphParams, CollaborationGraph, CollaborationGraphParams},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CitationNetworkQuery {
    pub max_nodes: Option<usize>,
    #[validate(range(min = 1900, max = 2100))]
    pub start_year: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CollaborationNetworkQuery {
    pub max_authors: Option<usize>,
    #[validate(range(min = 1900, max = 2100))]
    pub start_year: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "check_timeline_range"))]
pub struct TimelineQuery {
    #[validate(range(min = 1900, max = 2100))]
    pub start_year: Option<i32>,
    #[validate(range(min = 1900, max = 2100))]
    pub end_year: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PatentHistogramQuery {
    #[validate(range(min = 1900, max = 2100))]
    pub year: Option<i32>,
    #[serde(default)]
    pub with_patents_only: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct YearListingQuery {
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<usize>,
}

fn check_timeline_range(query: &TimelineQuery) -> std::result::Result<(), ValidationError> {
    match (query.start_year, query.end_year) {
        (Some(start), Some(end)) if start > end => {
            Err(ValidationError::new("start_year_after_end_year"))
        }
        _ => Ok(()),
    }
}

/// Resolve a requested graph size against the configured default and cap
fn graph_size(requested: Option<usize>, default: usize, cap: usize, field: &str) -> Result<usize> {
    match requested {
        None => Ok(default.min(cap)),
        Some(0) => Err(AppError::invalid_field(field, format!("{} must be at least 1", field))),
        Some(n) if n > cap => Err(AppError::invalid_field(
            field,
            format!("{} must be at most {}", field, cap),
        )),
        Some(n) => Ok(n),
    }
}

/// Most-cited papers and the citations among them
pub async fn citation_network(
    State(state): State<AppState>,
    query: std::result::Result<Query<CitationNetworkQuery>, QueryRejection>,
) -> Result<Json<CitationGraph>> {
    let query = parse_query(query)?;
    query.validate()?;

    let limits = &state.config.graph;
    let max_nodes = graph_size(query.max_nodes, limits.default_max_nodes, limits.max_graph_size, "max_nodes")?;

    let graph = graph::citation_graph(
        &state.dataset,
        CitationGraphParams {
            max_nodes,
            start_year: query.start_year,
        },
    );
    Ok(Json(graph))
}

/// Most-productive authors and their co-authorship links
pub async fn collaboration_network(
    State(state): State<AppState>,
    query: std::result::Result<Query<CollaborationNetworkQuery>, QueryRejection>,
) -> Result<Json<CollaborationGraph>> {
    let query = parse_query(query)?;
    query.validate()?;

    let limits = &state.config.graph;
    let max_authors = graph_size(
        query.max_authors,
        limits.default_max_authors,
        limits.max_graph_size,
        "max_authors",
    )?;

    let graph = graph::collaboration_graph(
        &state.dataset,
        CollaborationGraphParams {
            max_authors,
            start_year: query.start_year,
        },
    );
    Ok(Json(graph))
}

pub async fn timeline(
    State(state): State<AppState>,
    query: std::result::Result<Query<TimelineQuery>, QueryRejection>,
) -> Result<Json<Vec<TimelineEntry>>> {
    let query = parse_query(query)?;
    query.validate()?;

    Ok(Json(analytics::timeline(
        &state.dataset,
        YearRange::new(query.start_year, query.end_year),
    )))
}

pub async fn patent_histogram(
    State(state): State<AppState>,
    query: std::result::Result<Query<PatentHistogramQuery>, QueryRejection>,
) -> Result<Json<Vec<PatentBucket>>> {
    let query = parse_query(query)?;
    query.validate()?;

    Ok(Json(analytics::patent_histogram(
        &state.dataset,
        query.year,
        query.with_patents_only,
    )))
}

/// Papers published in one year, most cited first
pub async fn papers_by_year(
    State(state): State<AppState>,
    year: std::result::Result<Path<i32>, PathRejection>,
    query: std::result::Result<Query<YearListingQuery>, QueryRejection>,
) -> Result<Json<Vec<PaperSummary>>> {
    let Path(year) = year.map_err(|rejection| AppError::invalid_field("year", rejection.body_text()))?;
    let query = parse_query(query)?;
    query.validate()?;

    let limit = query.limit.unwrap_or(DEFAULT_YEAR_LISTING_LIMIT);
    Ok(Json(analytics::papers_in_year(&state.dataset, year, limit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_size_defaults_and_cap() {
        assert_eq!(graph_size(None, 200, 10_000, "max_nodes").unwrap(), 200);
        assert_eq!(graph_size(None, 200, 50, "max_nodes").unwrap(), 50);
        assert_eq!(graph_size(Some(7), 200, 10_000, "max_nodes").unwrap(), 7);
        assert!(graph_size(Some(0), 200, 10_000, "max_nodes").is_err());

        let err = graph_size(Some(10_001), 200, 10_000, "max_nodes").unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_timeline_range_validation() {
        let inverted = TimelineQuery { start_year: Some(2021), end_year: Some(2019) };
        assert!(inverted.validate().is_err());

        let open = TimelineQuery { start_year: Some(2021), end_year: None };
        assert!(open.validate().is_ok());
    }

    #[test]
    fn test_listing_limit_bounds() {
        assert!(YearListingQuery { limit: Some(0) }.validate().is_err());
        assert!(YearListingQuery { limit: Some(100) }.validate().is_ok());
    }
}
