//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all SPF metrics
pub const METRICS_PREFIX: &str = "spf";

/// Buckets for pipeline duration (in seconds); package runs are network bound
pub const PIPELINE_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    300.0,  // 5m
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

    // Pipeline metrics
    describe_counter!(
        format!("{}_pipelines_total", METRICS_PREFIX),
        Unit::Count,
        "Pipeline runs by pipeline and outcome"
    );

    describe_histogram!(
        format!("{}_pipeline_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Pipeline run latency in seconds"
    );

    // Storage metrics
    describe_counter!(
        format!("{}_storage_registrations_total", METRICS_PREFIX),
        Unit::Count,
        "Object storage registrations by outcome"
    );

    describe_counter!(
        format!("{}_assets_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Assets and renditions skipped during extraction"
    );

    // Queue metrics
    describe_counter!(
        format!("{}_queue_messages_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Total queue messages processed"
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

/// Tracks one pipeline run from start to terminal outcome
pub struct PipelineMetrics {
    start: Instant,
    pipeline: &'static str,
}

impl PipelineMetrics {
    pub fn start(pipeline: &'static str) -> Self {
        Self {
            start: Instant::now(),
            pipeline,
        }
    }

    /// Record the outcome (`completed` or `failed`)
    pub fn finish(self, outcome: &'static str) {
        counter!(
            format!("{}_pipelines_total", METRICS_PREFIX),
            "pipeline" => self.pipeline,
            "outcome" => outcome
        )
        .increment(1);

        histogram!(
            format!("{}_pipeline_duration_seconds", METRICS_PREFIX),
            "pipeline" => self.pipeline
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

/// Helper to record a storage registration
pub fn record_registration(success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!(
        format!("{}_storage_registrations_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);
}

/// Helper to record a skipped asset or rendition
pub fn record_skipped(kind: &'static str) {
    counter!(
        format!("{}_assets_skipped_total", METRICS_PREFIX),
        "kind" => kind
    )
    .increment(1);
}

/// Helper to record a processed queue message
pub fn record_message(kind: &'static str, outcome: &'static str) {
    counter!(
        format!("{}_queue_messages_processed_total", METRICS_PREFIX),
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);
}
