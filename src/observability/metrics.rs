//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, path, status class
//! - `http_request_duration_seconds` (histogram): latency by method, path
//! - `http_requests_rejected_total` (counter): admission denials by method, path
//!
//! # Design Decisions
//! - The recorder is owned by `HttpMetrics`, never installed globally, so
//!   every server (and every test) has isolated aggregations
//! - Handles come from the recorder's registry, which updates atomically
//! - Histogram buckets are the Prometheus client defaults

use std::time::Duration;

use axum::http::{Method, StatusCode};
use metrics::{Key, KeyName, Label, Level, Metadata, Recorder, SharedString};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const REQUESTS_REJECTED_TOTAL: &str = "http_requests_rejected_total";

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Request metrics for one server instance.
pub struct HttpMetrics {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl HttpMetrics {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
                DURATION_BUCKETS,
            )?
            .build_recorder();
        let handle = recorder.handle();

        recorder.describe_counter(
            KeyName::from(REQUESTS_TOTAL),
            None,
            SharedString::from("Total number of HTTP requests"),
        );
        recorder.describe_histogram(
            KeyName::from(REQUEST_DURATION_SECONDS),
            None,
            SharedString::from("HTTP request duration in seconds"),
        );
        recorder.describe_counter(
            KeyName::from(REQUESTS_REJECTED_TOTAL),
            None,
            SharedString::from("Requests denied by admission control"),
        );

        Ok(Self { recorder, handle })
    }

    /// Record one finished request.
    pub fn record_request(&self, method: &Method, path: &str, status: StatusCode, elapsed: Duration) {
        let metadata = metadata();

        let counter_key = Key::from_parts(
            REQUESTS_TOTAL,
            vec![
                Label::new("method", method.to_string()),
                Label::new("path", path.to_string()),
                Label::new("status_class", status_class(status)),
            ],
        );
        self.recorder.register_counter(&counter_key, &metadata).increment(1);

        let histogram_key = Key::from_parts(
            REQUEST_DURATION_SECONDS,
            vec![
                Label::new("method", method.to_string()),
                Label::new("path", path.to_string()),
            ],
        );
        self.recorder
            .register_histogram(&histogram_key, &metadata)
            .record(elapsed.as_secs_f64());
    }

    /// Record one admission denial.
    pub fn record_rejection(&self, method: &Method, path: &str) {
        let key = Key::from_parts(
            REQUESTS_REJECTED_TOTAL,
            vec![
                Label::new("method", method.to_string()),
                Label::new("path", path.to_string()),
            ],
        );
        self.recorder.register_counter(&key, &metadata()).increment(1);
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Drain histogram buffers; call periodically when nothing scrapes.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }
}

impl std::fmt::Debug for HttpMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMetrics").finish_non_exhaustive()
    }
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

/// Leading digit of a status code, e.g. `4xx`.
pub fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}
