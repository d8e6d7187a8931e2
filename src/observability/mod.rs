//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline produces:
//!     → logging.rs (structured log events, non-blocking writer)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → GET /metrics (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Correlation ID on every request-scoped record
//! - Metrics are owned by application state, not a global recorder

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LoggingError};
pub use metrics::HttpMetrics;
