//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming /api request (after logging and metrics stages):
//!     → rate_limit.rs (global token bucket)
//!     → allowed: resource handler
//!     → denied: 429 Too Many Requests, handler never runs
//! ```
//!
//! # Design Decisions
//! - Single in-memory bucket per process, shared by all clients and routes
//! - Denials are outcomes, never errors; no internal retry

pub mod rate_limit;

pub use rate_limit::RateLimiter;
