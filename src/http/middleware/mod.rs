//! Request pipeline stages, outermost first. Routing has already matched the
//! request (or chosen the fallback) when the first stage runs.
//!
//! ```text
//! observe (logging) → metrics → status capture → catch panic → timeout
//!     → body limit → admission (/api only) → handler
//! ```
//!
//! Admission sits innermost so rejected requests are still logged and
//! measured, but never reach a resource handler.

pub mod admission;
pub mod metrics;
pub mod observe;

pub use admission::admit;
pub use metrics::track_metrics;
pub use observe::observe_request;
