//! Resource handlers.
//!
//! ```text
//! GET  /health          health.rs   (store ping, JSON status)
//! GET  /ready           health.rs
//! GET  /metrics         metrics.rs  (Prometheus text format)
//! GET  /api/users       users.rs
//! POST /api/users       users.rs
//! GET  /api/users/{id}  users.rs
//! ```

pub mod health;
pub mod metrics;
pub mod users;
