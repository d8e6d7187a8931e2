//! Admission stage: global token bucket in front of the resource handlers.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::middleware::metrics::route_label;
use crate::http::request::RequestContext;
use crate::http::server::AppState;

/// Body of every rejected request.
pub const RATE_LIMITED_BODY: &str = "Rate limit exceeded";

pub async fn admit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.limiter.allow() {
        return next.run(request).await;
    }

    let path = route_label(&request);
    let correlation_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.correlation_id().to_string())
        .unwrap_or_default();

    tracing::warn!(
        method = %request.method(),
        path = %path,
        correlation_id = %correlation_id,
        "Rate limit exceeded"
    );
    state.metrics.record_rejection(request.method(), &path);

    rejected()
}

/// Plain-text 429, no JSON envelope.
pub fn rejected() -> Response {
    (StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_BODY).into_response()
}
