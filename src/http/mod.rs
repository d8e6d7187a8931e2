//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper-util auto builder, HTTP/1.1 + HTTP/2)
//!     → [routing] (route or fallback matched; `MatchedPath` set)
//!     → middleware/observe.rs (correlation id, request logs)
//!     → middleware/metrics.rs (counter + latency histogram)
//!     → response.rs (status capture)
//!     → middleware/admission.rs (/api only)
//!     → handlers
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{CorrelationId, RequestContext, X_CORRELATION_ID};
pub use response::{StatusCapture, StatusCaptureLayer};
pub use server::{build_router, AppState, HttpServer, RunningServer, StartupError};
