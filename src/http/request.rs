//! Request identity.
//!
//! # Responsibilities
//! - Generate a fresh correlation id for every inbound request
//! - Carry it in a typed, immutable `RequestContext` stored in request
//!   extensions, so handlers extract it with `Extension<RequestContext>`
//!
//! # Design Decisions
//! - Ids are never taken from the client; a new UUID v4 per request
//! - Context is created once at pipeline entry and only read afterwards

use std::fmt;
use std::time::Instant;

use axum::http::{HeaderName, HeaderValue};
use uuid::Uuid;

/// Response header carrying the correlation id.
pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

/// Unique identifier for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn header_value(&self) -> HeaderValue {
        let mut buf = Uuid::encode_buffer();
        let text = self.0.hyphenated().encode_lower(&mut buf);
        // Hyphenated hex is always a valid header value.
        HeaderValue::from_str(text).unwrap_or_else(|_| HeaderValue::from_static("invalid"))
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// Request-scoped values shared by every pipeline stage and the handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: CorrelationId,
    received_at: Instant,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            received_at: Instant::now(),
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
