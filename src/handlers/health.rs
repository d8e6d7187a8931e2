//! Liveness and readiness probes.

use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub checks: BTreeMap<&'static str, String>,
}

pub async fn health(State(state): State<AppState>) -> Response {
    let mut checks = BTreeMap::new();
    let timestamp = Utc::now();

    let (status, code) = match state.store.ping().await {
        Ok(()) => {
            checks.insert("database", "ok".to_string());
            ("healthy", StatusCode::OK)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            checks.insert("database", format!("error: {e}"));
            ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let body = HealthResponse {
        status,
        timestamp,
        version: env!("CARGO_PKG_VERSION"),
        checks,
    };
    (code, Json(body)).into_response()
}

pub async fn ready(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => Json(serde_json::json!({ "status": "ready" })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Database not ready").into_response()
        }
    }
}
