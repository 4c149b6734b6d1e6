//! Metrics and observability utilities
//!
//! Metric descriptions and recording helpers on the `metrics` facade.
//! An exporter is installed by the binary when enabled.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::{Duration, Instant};

/// Metrics prefix for all Cortex metrics
pub const METRICS_PREFIX: &str = "cortex";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Buckets for AI calls and document processing (typically slower)
pub const SLOW_BUCKETS: &[f64] = &[
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.000, // 2s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
    60.00, // 1m
    120.0, // 2m
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

    // Search metrics
    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search query latency in seconds"
    );

    describe_histogram!(
        format!("{}_search_results", METRICS_PREFIX),
        Unit::Count,
        "Number of results returned from search"
    );

    // Document processing metrics
    describe_counter!(
        format!("{}_documents_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Documents that reached a terminal processing status"
    );

    describe_histogram!(
        format!("{}_document_processing_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Time from processing start to terminal status"
    );

    // AI provider metrics
    describe_counter!(
        format!("{}_ai_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total chat completion requests by provider and outcome"
    );

    describe_histogram!(
        format!("{}_ai_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Chat completion latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    route: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, route: &str) -> Self {
        Self {
            start: Instant::now(),
            route: route.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "route" => self.route.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "route" => self.route
        )
        .record(duration);
    }
}

/// Helper to record search metrics
pub fn record_search(mode: &str, duration: Duration, result_count: usize) {
    counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .record(duration.as_secs_f64());

    histogram!(
        format!("{}_search_results", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .record(result_count as f64);
}

/// Helper to record a document reaching a terminal status
pub fn record_document_processed(status: &str, duration: Duration) {
    counter!(
        format!("{}_documents_processed_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_document_processing_seconds", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Helper to record chat completion metrics
pub fn record_ai_call(provider: &str, duration: Duration, success: bool) {
    let outcome = if success { "success" } else { "error" };

    counter!(
        format!("{}_ai_requests_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        format!("{}_ai_request_duration_seconds", METRICS_PREFIX),
        "provider" => provider.to_string()
    )
    .record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, SLOW_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every helper must be a silent no-op
        RequestMetrics::start("GET", "/api/search").finish(200);
        record_search("keyword", Duration::from_millis(3), 2);
        record_document_processed("INDEXED", Duration::from_secs(1));
        record_ai_call("groq", Duration::from_millis(400), false);
    }
}
