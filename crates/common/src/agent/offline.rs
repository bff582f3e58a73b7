//! Keyword router used when no reasoning service is configured
//!
//! Picks one tool from the wording of the question, then summarises the
//! tool result in plain text. Good enough for demos and tests; it does not
//! try to understand anything beyond a handful of phrases.

use super::{ReasoningDecision, ReasoningProvider, ReasoningRequest, ToolCall, TranscriptEntry};
use crate::errors::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub const MODEL_NAME: &str = "offline-router";

const HELP_TEXT: &str = "I can answer questions about papers per year, top authors, citation \
statistics, collaboration statistics, yearly trends, patent counts and the most cited papers. \
Try \"top 10 authors by h-index\" or \"citation trend since 2015\".";

/// Deterministic keyword router
#[derive(Debug, Default, Clone)]
pub struct OfflineProvider;

impl OfflineProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReasoningProvider for OfflineProvider {
    async fn reason(&self, request: &ReasoningRequest) -> Result<ReasoningDecision> {
        // Results since the last user message mean the tool already ran
        let mut results = Vec::new();
        let mut question = None;
        for entry in request.transcript.iter().rev() {
            match entry {
                TranscriptEntry::ToolResult { tool, is_error, content, .. } => {
                    results.push((tool.as_str(), *is_error, content))
                }
                TranscriptEntry::User { text } => {
                    question = Some(text.as_str());
                    break;
                }
                _ => {}
            }
        }

        if !results.is_empty() {
            results.reverse();
            let text = results
                .into_iter()
                .map(|(tool, is_error, content)| summarize(tool, is_error, content))
                .collect::<Vec<_>>()
                .join("\n\n");
            return Ok(ReasoningDecision::Respond { text });
        }

        Ok(match question.and_then(route) {
            Some((tool, arguments)) => ReasoningDecision::CallTools {
                preamble: None,
                calls: vec![ToolCall::new(tool, arguments)],
            },
            None => ReasoningDecision::Respond {
                text: HELP_TEXT.to_string(),
            },
        })
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }
}

/// Map a question to a tool and its arguments
fn route(question: &str) -> Option<(&'static str, Value)> {
    let q = question.to_lowercase();
    let (years, counts) = numbers(&q);
    let has = |words: &[&str]| words.iter().any(|w| q.contains(w));

    if has(&["author", "researcher"]) && !has(&["collaborat", "co-author", "coauthor"]) {
        let mut args = Map::new();
        if let Some(n) = counts.first() {
            args.insert("n".into(), json!((*n).clamp(1, 100)));
        }
        if has(&["h-index", "h index", "h_index"]) {
            args.insert("metric".into(), json!("h_index"));
        } else if has(&["productiv"]) {
            args.insert("metric".into(), json!("productivity"));
        }
        return Some(("top-authors", Value::Object(args)));
    }

    if has(&["collaborat", "co-author", "coauthor"]) {
        return Some(("collaboration-stats", json!({})));
    }

    if has(&["trend", "growth", "change over"]) {
        let metric = if has(&["citation", "cited"]) {
            "citations"
        } else if has(&["patent"]) {
            "patents"
        } else {
            "papers"
        };
        let mut args = year_window(&years);
        args.insert("metric".into(), json!(metric));
        return Some(("yearly-trend", Value::Object(args)));
    }

    if has(&["patent"]) {
        let mut args = Map::new();
        if let [year] = years.as_slice() {
            args.insert("year".into(), json!(year));
        }
        return Some(("patent-histogram", Value::Object(args)));
    }

    if has(&["most cited", "top papers", "highly cited"]) {
        let mut args = Map::new();
        if let [year] = years.as_slice() {
            args.insert("year".into(), json!(year));
        }
        if let Some(limit) = counts.first() {
            args.insert("limit".into(), json!((*limit).clamp(1, 500)));
        }
        return Some(("papers-with-filters", Value::Object(args)));
    }

    if has(&["citation", "cited"]) {
        let mut args = Map::new();
        if let [year] = years.as_slice() {
            args.insert("year".into(), json!(year));
        }
        return Some(("citation-stats", Value::Object(args)));
    }

    if has(&["per year", "each year", "by year", "timeline", "how many papers", "publication"]) {
        return Some(("papers-by-year", Value::Object(year_window(&years))));
    }

    None
}

/// Split the integers in a question into plausible years and plain counts
fn numbers(q: &str) -> (Vec<i32>, Vec<u64>) {
    let mut years = Vec::new();
    let mut counts = Vec::new();
    for token in q.split(|c: char| !c.is_ascii_digit()).filter(|t| !t.is_empty()) {
        let Ok(n) = token.parse::<u64>() else { continue };
        if (1900..=2100).contains(&n) {
            years.push(n as i32);
        } else {
            counts.push(n);
        }
    }
    (years, counts)
}

fn year_window(years: &[i32]) -> Map<String, Value> {
    let mut args = Map::new();
    match years {
        [] => {}
        [start] => {
            args.insert("start_year".into(), json!(start));
        }
        [a, b, ..] => {
            args.insert("start_year".into(), json!(a.min(b)));
            args.insert("end_year".into(), json!(a.max(b)));
        }
    }
    args
}

fn summarize(tool: &str, is_error: bool, content: &Value) -> String {
    if is_error {
        let message = content["error"]["message"].as_str().unwrap_or("unknown error");
        return format!("The {} query failed: {}", tool, message);
    }

    let data = &content["data"];
    let rows = data.as_array().map(Vec::as_slice).unwrap_or(&[]);

    match tool {
        "papers-by-year" => {
            let total: u64 = rows.iter().filter_map(|r| r["paper_count"].as_u64()).sum();
            match rows.iter().max_by_key(|r| r["paper_count"].as_u64().unwrap_or(0)) {
                Some(peak) => format!(
                    "{} papers across {} years. The busiest year was {} with {} papers.",
                    total,
                    rows.len(),
                    peak["year"],
                    peak["paper_count"]
                ),
                None => "No papers fall in that period.".to_string(),
            }
        }
        "top-authors" => {
            if rows.is_empty() {
                return "No authors found.".to_string();
            }
            let listed = rows
                .iter()
                .take(5)
                .map(|r| {
                    format!(
                        "{}. {} ({} papers, h-index {})",
                        r["rank"],
                        r["display_name"].as_str().unwrap_or("?"),
                        r["paper_count"],
                        r["h_index"]
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            format!("Top {} authors: {}.", rows.len(), listed)
        }
        "citation-stats" => format!(
            "{} papers with {} citations in total (mean {}, median {}, max {}). {} papers have no citations.",
            data["total_papers"],
            data["total_citations"],
            fmt_number(&data["mean_citations"]),
            fmt_number(&data["median_citations"]),
            data["max_citations"],
            data["zero_citation_count"]
        ),
        "collaboration-stats" => {
            let mut text = format!(
                "{} distinct co-author pairs among {} authors.",
                data["total_collaborations"], data["total_authors"]
            );
            if let Some(pair) = data["top_pair"].as_object() {
                text.push_str(&format!(
                    " The most frequent pair is {} and {} with {} shared papers.",
                    pair.get("name_a").and_then(Value::as_str).unwrap_or("?"),
                    pair.get("name_b").and_then(Value::as_str).unwrap_or("?"),
                    pair.get("weight").cloned().unwrap_or(Value::Null)
                ));
            }
            text
        }
        "yearly-trend" => match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => format!(
                "{} went from {} in {} to {} in {} (latest change {}%).",
                last["metric"].as_str().unwrap_or("value"),
                first["value"],
                first["year"],
                last["value"],
                last["year"],
                fmt_number(&last["pct_change"])
            ),
            _ => "No data for that period.".to_string(),
        },
        "patent-histogram" => {
            let papers: u64 = rows.iter().filter_map(|r| r["paper_count"].as_u64()).sum();
            format!("{} papers spread over {} patent-count buckets.", papers, rows.len())
        }
        "papers-with-filters" => match rows.first() {
            Some(top) => format!(
                "Found {} papers. The most cited is {} with {} citations.",
                rows.len(),
                top["paperid"].as_str().unwrap_or("?"),
                top["cited_by_count"]
            ),
            None => "No papers match those filters.".to_string(),
        },
        _ => "Here are the results.".to_string(),
    }
}

fn fmt_number(value: &Value) -> String {
    match value.as_f64() {
        Some(v) => format!("{:.2}", v),
        None => "n/a".to_string(),
    }
}
