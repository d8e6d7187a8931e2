//! User service library.
//!
//! HTTP user CRUD behind a fixed request pipeline (correlation id, logging,
//! metrics, admission control) with an observable, drainable server
//! lifecycle.

pub mod config;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;
pub mod store;

pub use config::schema::ServiceConfig;
pub use http::{AppState, HttpServer, RunningServer};
pub use lifecycle::{LifecycleState, ShutdownOutcome};
