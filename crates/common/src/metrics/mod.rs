//! Metrics and observability utilities
//!
//! Prometheus metrics through the `metrics` facade with standardized naming.
//! Nothing is recorded unless the gateway installs an exporter.

use crate::dataset::LoadReport;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::{Duration, Instant};

/// Metrics prefix for all ScholarLens metrics
pub const METRICS_PREFIX: &str = "scholarlens";

/// Histogram buckets for HTTP and tool latency (in seconds).
/// Dashboard queries are in-memory and should land well under 50ms.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    5.000,  // 5s
];

/// Buckets for reasoning calls and whole chat turns (much slower)
pub const REASONING_BUCKETS: &[f64] = &[
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 60s
    90.00,  // 90s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Tool metrics
    describe_counter!(
        format!("{}_tool_invocations_total", METRICS_PREFIX),
        Unit::Count,
        "Query tool invocations by tool and outcome"
    );

    describe_histogram!(
        format!("{}_tool_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Query tool execution latency in seconds"
    );

    // Agent metrics
    describe_counter!(
        format!("{}_agent_turns_total", METRICS_PREFIX),
        Unit::Count,
        "Chat turns by outcome"
    );

    describe_histogram!(
        format!("{}_agent_iterations", METRICS_PREFIX),
        Unit::Count,
        "Reasoning iterations used per chat turn"
    );

    describe_histogram!(
        format!("{}_agent_turn_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Chat turn latency in seconds"
    );

    // Reasoning service metrics
    describe_histogram!(
        format!("{}_reasoning_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Reasoning call latency in seconds"
    );

    describe_counter!(
        format!("{}_reasoning_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Failed reasoning calls"
    );

    describe_counter!(
        format!("{}_reasoning_retries_total", METRICS_PREFIX),
        Unit::Count,
        "Retried reasoning calls"
    );

    // Dataset gauges
    describe_gauge!(
        format!("{}_dataset_rows", METRICS_PREFIX),
        Unit::Count,
        "Rows loaded per dataset table"
    );

    describe_gauge!(
        format!("{}_dataset_dropped_rows", METRICS_PREFIX),
        Unit::Count,
        "Rows dropped at load per reason"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record a tool invocation
pub fn record_tool(tool: &str, outcome: &str, duration: Duration) {
    counter!(
        format!("{}_tool_invocations_total", METRICS_PREFIX),
        "tool" => tool.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_tool_duration_seconds", METRICS_PREFIX),
        "tool" => tool.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Helper to record a finished chat turn
pub fn record_turn(outcome: &str, iterations: usize, duration: Duration) {
    counter!(
        format!("{}_agent_turns_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_agent_iterations", METRICS_PREFIX)).record(iterations as f64);

    histogram!(format!("{}_agent_turn_duration_seconds", METRICS_PREFIX))
        .record(duration.as_secs_f64());
}

/// Helper to record one reasoning call attempt
pub fn record_reasoning(model: &str, duration: Duration, success: bool) {
    histogram!(
        format!("{}_reasoning_duration_seconds", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .record(duration.as_secs_f64());

    if !success {
        counter!(
            format!("{}_reasoning_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

pub fn record_reasoning_retry(model: &str) {
    counter!(
        format!("{}_reasoning_retries_total", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .increment(1);
}

/// Publish dataset sizes once the snapshot is loaded
pub fn record_dataset(report: &LoadReport) {
    let rows = [
        ("papers", report.papers),
        ("paper_refs", report.references),
        ("authors", report.authors),
        ("paper_author_affiliation", report.affiliations),
    ];
    for (table, count) in rows {
        gauge!(
            format!("{}_dataset_rows", METRICS_PREFIX),
            "table" => table
        )
        .set(count as f64);
    }

    let dropped = [
        ("dangling_reference", report.dangling_references),
        ("dangling_affiliation", report.dangling_affiliations),
        ("duplicate_affiliation", report.duplicate_affiliations),
        ("malformed_row", report.malformed_rows),
        ("duplicate_paper", report.duplicate_papers),
        ("duplicate_author", report.duplicate_authors),
    ];
    for (reason, count) in dropped {
        gauge!(
            format!("{}_dataset_dropped_rows", METRICS_PREFIX),
            "reason" => reason
        )
        .set(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        for buckets in [LATENCY_BUCKETS, REASONING_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
        // Turn timeout default (90s) must be representable
        assert!(REASONING_BUCKETS.contains(&90.0));
    }

    #[test]
    fn test_recorders_without_exporter() {
        let metrics = RequestMetrics::start("GET", "/api/timeline");
        metrics.finish(200);
        record_tool("top-authors", "ok", Duration::from_millis(2));
        record_turn("completed", 2, Duration::from_millis(40));
        record_reasoning("offline", Duration::from_millis(1), false);
        record_dataset(&LoadReport::default());
    }
}
