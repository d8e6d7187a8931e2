//! Logging stage: request identity and structured request logs.
//!
//! For every request, in order:
//! 1. create the `RequestContext` (fresh correlation id) and the request's
//!    `StatusCapture` cell, both stored in extensions
//! 2. log "Request started"
//! 3. run the rest of the pipeline
//! 4. stamp `X-Correlation-ID` on the response and log "Request completed"
//!
//! If the request future is dropped before step 4 (client gone, forced
//! shutdown), the completion record is still emitted from `Drop` using
//! whatever status was captured.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, Method},
    middleware::Next,
    response::Response,
};

use crate::http::request::{RequestContext, X_CORRELATION_ID};
use crate::http::response::StatusCapture;

pub async fn observe_request(mut request: Request, next: Next) -> Response {
    let context = RequestContext::new();
    let capture = StatusCapture::new();
    request.extensions_mut().insert(context.clone());
    request.extensions_mut().insert(capture.clone());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    tracing::info!(
        method = %method,
        path = %path,
        remote_addr = %remote_addr,
        user_agent = %user_agent,
        correlation_id = %context.correlation_id(),
        "Request started"
    );

    let in_flight = InFlight {
        context,
        capture,
        method,
        path,
        started: Instant::now(),
        completed: false,
    };

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(X_CORRELATION_ID, in_flight.context.correlation_id().header_value());

    in_flight.complete();
    response
}

/// Completion record for one request; emitted exactly once.
struct InFlight {
    context: RequestContext,
    capture: StatusCapture,
    method: Method,
    path: String,
    started: Instant,
    completed: bool,
}

impl InFlight {
    fn complete(mut self) {
        self.emit(false);
        self.completed = true;
    }

    fn emit(&self, cancelled: bool) {
        let status = self.capture.status();
        let duration_ms = millis(self.started.elapsed());
        let correlation_id = self.context.correlation_id();

        if cancelled {
            tracing::warn!(
                method = %self.method,
                path = %self.path,
                status_code = status.as_u16(),
                duration_ms,
                correlation_id = %correlation_id,
                cancelled = true,
                "Request completed"
            );
            return;
        }

        tracing::info!(
            method = %self.method,
            path = %self.path,
            status_code = status.as_u16(),
            duration_ms,
            correlation_id = %correlation_id,
            "Request completed"
        );

        if status.is_server_error() {
            tracing::error!(
                method = %self.method,
                path = %self.path,
                status_code = status.as_u16(),
                correlation_id = %correlation_id,
                "Request failed"
            );
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.completed {
            self.emit(true);
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
