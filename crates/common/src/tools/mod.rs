//! Query tool registry
//!
//! A fixed catalogue of named query tools over the dataset snapshot. Each
//! tool has a typed argument struct validated once at this boundary, a
//! JSON-Schema description for the reasoning service, and a result envelope
//! `{data, chart_spec}`. The dashboard's `data/*` routes and the agent loop
//! both go through this registry.

pub mod chart;

pub use chart::ChartSpec;

use chart::{Channel, FieldType};

use crate::analytics::{
    self, AuthorMetric, PaperFilter, TrendMetric, YearRange,
};
use crate::dataset::Dataset;
use crate::errors::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use validator::{Validate, ValidationError};

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

/// The closed set of query tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolName {
    PapersByYear,
    TopAuthors,
    CitationStats,
    CollaborationStats,
    YearlyTrend,
    PatentHistogram,
    PapersWithFilters,
}

impl ToolName {
    pub const ALL: [ToolName; 7] = [
        ToolName::PapersByYear,
        ToolName::TopAuthors,
        ToolName::CitationStats,
        ToolName::CollaborationStats,
        ToolName::YearlyTrend,
        ToolName::PatentHistogram,
        ToolName::PapersWithFilters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::PapersByYear => "papers-by-year",
            ToolName::TopAuthors => "top-authors",
            ToolName::CitationStats => "citation-stats",
            ToolName::CollaborationStats => "collaboration-stats",
            ToolName::YearlyTrend => "yearly-trend",
            ToolName::PatentHistogram => "patent-histogram",
            ToolName::PapersWithFilters => "papers-with-filters",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolName::PapersByYear => {
                "Count papers per publication year with total citations and total patent citations. Optionally bounded by start_year/end_year (inclusive)."
            }
            ToolName::TopAuthors => {
                "Rank authors by paper_count (default), h_index or productivity and return the top n."
            }
            ToolName::CitationStats => {
                "Citation statistics (total, mean, median, max, zero-citation papers, patents) over all papers or one year."
            }
            ToolName::CollaborationStats => {
                "Co-authorship statistics: distinct collaborating pairs, mean pair weight, most frequent pair, authors per paper."
            }
            ToolName::YearlyTrend => {
                "Per-year papers, citations or patents with percentage change from the previous year."
            }
            ToolName::PatentHistogram => {
                "Distribution of papers by number of citing patents, optionally for one year."
            }
            ToolName::PapersWithFilters => {
                "List the most cited papers matching optional year, minimum citation and patent filters."
            }
        }
    }

    /// JSON-Schema object for the tool's arguments
    pub fn input_schema(&self) -> Value {
        let year = json!({ "type": "integer", "minimum": MIN_YEAR, "maximum": MAX_YEAR });
        let properties = match self {
            ToolName::PapersByYear => json!({
                "start_year": with_description(&year, "First year, inclusive"),
                "end_year": with_description(&year, "Last year, inclusive"),
            }),
            ToolName::TopAuthors => json!({
                "n": { "type": "integer", "minimum": 1, "maximum": 100, "default": 10,
                       "description": "Number of authors to return" },
                "metric": { "type": "string", "enum": ["paper_count", "h_index", "productivity"],
                            "default": "paper_count" },
            }),
            ToolName::CitationStats => json!({
                "year": with_description(&year, "Restrict to papers published in this year"),
            }),
            ToolName::CollaborationStats => json!({}),
            ToolName::YearlyTrend => json!({
                "metric": { "type": "string", "enum": ["papers", "citations", "patents"],
                            "default": "papers" },
                "start_year": with_description(&year, "First year, inclusive"),
                "end_year": with_description(&year, "Last year, inclusive"),
            }),
            ToolName::PatentHistogram => json!({
                "year": with_description(&year, "Restrict to papers published in this year"),
                "with_patents_only": { "type": "boolean", "default": false,
                                       "description": "Hide papers without patent citations" },
            }),
            ToolName::PapersWithFilters => json!({
                "year": with_description(&year, "Publication year"),
                "min_citations": { "type": "integer", "minimum": 0 },
                "has_patents": { "type": "boolean" },
                "limit": { "type": "integer", "minimum": 1, "maximum": 500, "default": 20 },
            }),
        };

        json!({
            "type": "object",
            "properties": properties,
            "required": [],
            "additionalProperties": false,
        })
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn with_description(schema: &Value, description: &str) -> Value {
    let mut schema = schema.clone();
    schema["description"] = json!(description);
    schema
}

// Argument structs

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "check_papers_by_year"))]
pub struct PapersByYearArgs {
    #[validate(range(min = 1900, max = 2100))]
    pub start_year: Option<i32>,
    #[validate(range(min = 1900, max = 2100))]
    pub end_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TopAuthorsArgs {
    #[serde(default = "default_top_n", alias = "top_n")]
    #[validate(range(min = 1, max = 100))]
    pub n: usize,
    #[serde(default)]
    pub metric: AuthorMetric,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CitationStatsArgs {
    #[validate(range(min = 1900, max = 2100))]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CollaborationStatsArgs {}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "check_yearly_trend"))]
pub struct YearlyTrendArgs {
    #[serde(default)]
    pub metric: TrendMetric,
    #[validate(range(min = 1900, max = 2100))]
    pub start_year: Option<i32>,
    #[validate(range(min = 1900, max = 2100))]
    pub end_year: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PatentHistogramArgs {
    #[validate(range(min = 1900, max = 2100))]
    pub year: Option<i32>,
    #[serde(default)]
    pub with_patents_only: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PapersWithFiltersArgs {
    #[validate(range(min = 1900, max = 2100))]
    pub year: Option<i32>,
    pub min_citations: Option<u64>,
    pub has_patents: Option<bool>,
    #[serde(default = "default_paper_limit")]
    #[validate(range(min = 1, max = 500))]
    pub limit: usize,
}

fn default_top_n() -> usize { 10 }
fn default_paper_limit() -> usize { 20 }

impl Default for TopAuthorsArgs {
    fn default() -> Self {
        Self {
            n: default_top_n(),
            metric: AuthorMetric::default(),
        }
    }
}

impl Default for PapersWithFiltersArgs {
    fn default() -> Self {
        Self {
            year: None,
            min_citations: None,
            has_patents: None,
            limit: default_paper_limit(),
        }
    }
}

fn check_year_order(start: Option<i32>, end: Option<i32>) -> std::result::Result<(), ValidationError> {
    match (start, end) {
        (Some(s), Some(e)) if s > e => {
            let mut err = ValidationError::new("year_order");
            err.message = Some("start_year must not be after end_year".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

fn check_papers_by_year(args: &PapersByYearArgs) -> std::result::Result<(), ValidationError> {
    check_year_order(args.start_year, args.end_year)
}

fn check_yearly_trend(args: &YearlyTrendArgs) -> std::result::Result<(), ValidationError> {
    check_year_order(args.start_year, args.end_year)
}

/// A parsed and validated tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    PapersByYear(PapersByYearArgs),
    TopAuthors(TopAuthorsArgs),
    CitationStats(CitationStatsArgs),
    CollaborationStats(CollaborationStatsArgs),
    YearlyTrend(YearlyTrendArgs),
    PatentHistogram(PatentHistogramArgs),
    PapersWithFilters(PapersWithFiltersArgs),
}

impl ToolRequest {
    /// Resolve a tool by name and decode its JSON arguments.
    ///
    /// `null` arguments are treated as an empty object.
    pub fn parse(name: &str, args: Value) -> Result<Self> {
        let tool = ToolName::from_name(name).ok_or_else(|| AppError::UnknownTool {
            name: name.to_string(),
        })?;

        Ok(match tool {
            ToolName::PapersByYear => ToolRequest::PapersByYear(decode(tool, args)?),
            ToolName::TopAuthors => ToolRequest::TopAuthors(decode(tool, args)?),
            ToolName::CitationStats => ToolRequest::CitationStats(decode(tool, args)?),
            ToolName::CollaborationStats => ToolRequest::CollaborationStats(decode(tool, args)?),
            ToolName::YearlyTrend => ToolRequest::YearlyTrend(decode(tool, args)?),
            ToolName::PatentHistogram => ToolRequest::PatentHistogram(decode(tool, args)?),
            ToolName::PapersWithFilters => ToolRequest::PapersWithFilters(decode(tool, args)?),
        })
    }

    pub fn name(&self) -> ToolName {
        match self {
            ToolRequest::PapersByYear(_) => ToolName::PapersByYear,
            ToolRequest::TopAuthors(_) => ToolName::TopAuthors,
            ToolRequest::CitationStats(_) => ToolName::CitationStats,
            ToolRequest::CollaborationStats(_) => ToolName::CollaborationStats,
            ToolRequest::YearlyTrend(_) => ToolName::YearlyTrend,
            ToolRequest::PatentHistogram(_) => ToolName::PatentHistogram,
            ToolRequest::PapersWithFilters(_) => ToolName::PapersWithFilters,
        }
    }

    /// Re-validate arguments built in code rather than parsed from JSON
    pub fn validate(&self) -> Result<()> {
        let result = match self {
            ToolRequest::PapersByYear(a) => a.validate(),
            ToolRequest::TopAuthors(a) => a.validate(),
            ToolRequest::CitationStats(a) => a.validate(),
            ToolRequest::CollaborationStats(a) => a.validate(),
            ToolRequest::YearlyTrend(a) => a.validate(),
            ToolRequest::PatentHistogram(a) => a.validate(),
            ToolRequest::PapersWithFilters(a) => a.validate(),
        };
        result.map_err(|e| invalid_argument(self.name(), e.to_string()))
    }
}

fn invalid_argument(tool: ToolName, message: impl Into<String>) -> AppError {
    AppError::InvalidToolArgument {
        tool: tool.as_str().to_string(),
        message: message.into(),
    }
}

fn decode<T>(tool: ToolName, args: Value) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let args = if args.is_null() { json!({}) } else { args };
    let parsed: T = serde_json::from_value(args).map_err(|e| invalid_argument(tool, e.to_string()))?;
    parsed
        .validate()
        .map_err(|e| invalid_argument(tool, e.to_string()))?;
    Ok(parsed)
}

/// Tool description handed to the reasoning service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Successful tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEnvelope {
    pub data: Value,
    pub chart_spec: Option<ChartSpec>,
}

/// Result of [`ToolRegistry::invoke`]; errors are data, not faults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool: String,
    pub is_error: bool,
    /// The envelope on success, `{error: {code, message, details?}}` otherwise
    pub payload: Value,
    #[serde(skip)]
    pub chart_spec: Option<ChartSpec>,
}

impl ToolOutcome {
    fn success(tool: ToolName, envelope: ToolEnvelope) -> Result<Self> {
        let chart_spec = envelope.chart_spec.clone();
        Ok(Self {
            tool: tool.as_str().to_string(),
            is_error: false,
            payload: serde_json::to_value(envelope)?,
            chart_spec,
        })
    }

    fn failure(tool: &str, error: &AppError) -> Self {
        Self {
            tool: tool.to_string(),
            is_error: true,
            payload: serde_json::to_value(error.to_body())
                .unwrap_or_else(|_| json!({ "error": { "message": error.to_string() } })),
            chart_spec: None,
        }
    }
}

/// Executes tools against a shared snapshot
pub struct ToolRegistry {
    dataset: Arc<Dataset>,
}

impl ToolRegistry {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// The full catalogue, in a stable order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolName::ALL
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.as_str().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Run a validated request
    pub fn execute(&self, request: &ToolRequest) -> Result<ToolEnvelope> {
        let start = Instant::now();
        let tool = request.name();

        let result = self.run(request);

        let outcome = if result.is_ok() { "ok" } else { "error" };
        crate::metrics::record_tool(tool.as_str(), outcome, start.elapsed());
        debug!(
            tool = %tool,
            outcome,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Executed tool"
        );

        result
    }

    /// Parse, validate and execute; every failure becomes an error payload
    pub fn invoke(&self, name: &str, args: Value) -> ToolOutcome {
        let request = match ToolRequest::parse(name, args) {
            Ok(request) => request,
            Err(error) => {
                warn!(tool = %name, error = %error, "Tool call rejected");
                crate::metrics::record_tool(metric_label(name), "rejected", Duration::ZERO);
                return ToolOutcome::failure(name, &error);
            }
        };

        let result = self
            .execute(&request)
            .and_then(|envelope| ToolOutcome::success(request.name(), envelope));

        match result {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(tool = %name, error = %error, "Tool execution failed");
                ToolOutcome::failure(name, &error)
            }
        }
    }

    fn run(&self, request: &ToolRequest) -> Result<ToolEnvelope> {
        let ds = self.dataset.as_ref();

        match request {
            ToolRequest::PapersByYear(args) => {
                let rows = analytics::timeline(ds, YearRange::new(args.start_year, args.end_year));
                let values = rows_of(&rows)?;
                Ok(ToolEnvelope {
                    chart_spec: Some(ChartSpec::bar("Papers per Year", values, "year", "paper_count")),
                    data: serde_json::to_value(rows)?,
                })
            }
            ToolRequest::TopAuthors(args) => {
                let rows = analytics::top_authors(ds, args.n, args.metric);
                let values = rows_of(&rows)?;
                let title = format!("Top {} Authors by {}", args.n, metric_title(args.metric));
                // Names are not unique, so bars are keyed by author id
                let chart = ChartSpec::horizontal_bar(&title, values, "author_id", args.metric.as_str())
                    .with_category_title("Author")
                    .with_tooltip(vec![
                        Channel::new("display_name", FieldType::Nominal).titled("Author"),
                        Channel::new(args.metric.as_str(), FieldType::Quantitative),
                    ]);
                Ok(ToolEnvelope {
                    chart_spec: Some(chart),
                    data: serde_json::to_value(rows)?,
                })
            }
            ToolRequest::CitationStats(args) => Ok(ToolEnvelope {
                data: serde_json::to_value(analytics::citation_stats(ds, args.year))?,
                chart_spec: None,
            }),
            ToolRequest::CollaborationStats(_) => Ok(ToolEnvelope {
                data: serde_json::to_value(analytics::collaboration_stats(ds))?,
                chart_spec: None,
            }),
            ToolRequest::YearlyTrend(args) => {
                let points = analytics::yearly_trend(
                    ds,
                    args.metric,
                    YearRange::new(args.start_year, args.end_year),
                );
                let values = rows_of(&points)?;
                let title = format!("Yearly Trend: {}", args.metric.as_str());
                Ok(ToolEnvelope {
                    chart_spec: Some(ChartSpec::line(&title, values, "year", "value").with_color("metric")),
                    data: serde_json::to_value(points)?,
                })
            }
            ToolRequest::PatentHistogram(args) => {
                let buckets = analytics::patent_histogram(ds, args.year, args.with_patents_only);
                let values = rows_of(&buckets)?;
                let title = match args.year {
                    Some(year) => format!("Patent Citations per Paper ({})", year),
                    None => "Patent Citations per Paper".to_string(),
                };
                Ok(ToolEnvelope {
                    chart_spec: Some(ChartSpec::bar(&title, values, "patent_count", "paper_count")),
                    data: serde_json::to_value(buckets)?,
                })
            }
            ToolRequest::PapersWithFilters(args) => {
                let filter = PaperFilter {
                    year: args.year,
                    min_citations: args.min_citations,
                    has_patents: args.has_patents,
                    limit: args.limit,
                };
                Ok(ToolEnvelope {
                    data: serde_json::to_value(analytics::papers_with_filters(ds, &filter))?,
                    chart_spec: None,
                })
            }
        }
    }
}

fn rows_of<T: Serialize>(rows: &[T]) -> Result<Vec<Value>> {
    rows.iter()
        .map(|row| serde_json::to_value(row).map_err(AppError::from))
        .collect()
}

/// Tool names come from the model; only catalogue names become metric labels
fn metric_label(name: &str) -> &'static str {
    ToolName::from_name(name).map_or("unknown", |tool| tool.as_str())
}

fn metric_title(metric: AuthorMetric) -> &'static str {
    match metric {
        AuthorMetric::PaperCount => "Paper Count",
        AuthorMetric::HIndex => "h-index",
        AuthorMetric::Productivity => "Productivity",
    }
}
