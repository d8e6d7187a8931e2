//! In-process user store.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt};

use crate::store::{NewUser, StoreError, User, UserStore};

/// A thread-safe user table held in memory.
#[derive(Debug)]
pub struct MemoryStore {
    users: DashMap<i64, User>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    fn insert(&self, new_user: NewUser) -> User {
        let now = Utc::now();
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: new_user.name,
            email: new_user.email,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        user
    }

    fn snapshot(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|entry| entry.value().clone()).collect();
        // Ids break ties between users created at the same instant.
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        users
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore for MemoryStore {
    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        future::ready(Ok(())).boxed()
    }

    fn list_users(&self) -> BoxFuture<'_, Result<Vec<User>, StoreError>> {
        future::ready(Ok(self.snapshot())).boxed()
    }

    fn get_user(&self, id: i64) -> BoxFuture<'_, Result<Option<User>, StoreError>> {
        let user = self.users.get(&id).map(|entry| entry.value().clone());
        future::ready(Ok(user)).boxed()
    }

    fn create_user(&self, user: NewUser) -> BoxFuture<'_, Result<User, StoreError>> {
        future::ready(Ok(self.insert(user))).boxed()
    }
}
