//! Persistence collaborator.
//!
//! # Responsibilities
//! - Liveness probe for health/readiness endpoints
//! - List, fetch and insert users
//!
//! # Design Decisions
//! - Object-safe trait with boxed futures so handlers share `Arc<dyn UserStore>`
//! - No retries here; a failed call surfaces as `StoreError`

pub mod memory;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Serialized as RFC 3339.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("data store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Storage backend for users.
pub trait UserStore: Send + Sync + 'static {
    /// Check the backend is reachable.
    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// All users, newest first.
    fn list_users(&self) -> BoxFuture<'_, Result<Vec<User>, StoreError>>;

    fn get_user(&self, id: i64) -> BoxFuture<'_, Result<Option<User>, StoreError>>;

    fn create_user(&self, user: NewUser) -> BoxFuture<'_, Result<User, StoreError>>;
}
