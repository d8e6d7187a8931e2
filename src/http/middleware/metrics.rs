//! Metrics stage: request counter and latency histogram.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use crate::http::response::StatusCapture;
use crate::http::server::AppState;
use crate::observability::metrics::HttpMetrics;

pub async fn track_metrics(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let capture = match request.extensions().get::<StatusCapture>() {
        Some(capture) => capture.clone(),
        None => {
            let capture = StatusCapture::new();
            request.extensions_mut().insert(capture.clone());
            capture
        }
    };

    let sample = Sample {
        metrics: Arc::clone(&state.metrics),
        method: request.method().clone(),
        path: route_label(&request),
        capture,
        started: Instant::now(),
        recorded: false,
    };

    let response = next.run(request).await;
    sample.record();
    response
}

/// Matched route template when routing succeeded, raw path otherwise.
pub(crate) fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

/// One pending observation; recorded exactly once, on completion or drop.
struct Sample {
    metrics: Arc<HttpMetrics>,
    method: Method,
    path: String,
    capture: StatusCapture,
    started: Instant,
    recorded: bool,
}

impl Sample {
    fn record(mut self) {
        self.flush();
    }

    fn flush(&mut self) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        self.metrics.record_request(
            &self.method,
            &self.path,
            self.capture.status(),
            self.started.elapsed(),
        );
    }
}

impl Drop for Sample {
    fn drop(&mut self) {
        self.flush();
    }
}
