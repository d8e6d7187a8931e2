//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use tracing_subscriber::fmt::MakeWriter;

use user_service::config::ServiceConfig;
use user_service::http::{build_router, AppState};
use user_service::store::{MemoryStore, NewUser, StoreError, User, UserStore};

/// Config bound to an ephemeral loopback port with generous admission.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.rate_limit.requests_per_second = 10_000.0;
    config.rate_limit.burst_size = 10_000;
    config
}

pub fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// Value of the first sample named `name` carrying every label in `labels`.
pub fn metric_value(rendered: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    rendered
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
        })
        .find(|line| {
            labels
                .iter()
                .all(|(key, value)| line.contains(&format!("{key}=\"{value}\"")))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}

/// In-memory log sink for a JSON `fmt` subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install a JSON subscriber writing here as the thread default.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn records(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Records whose message equals `message`.
    pub fn messages(&self, message: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|record| record["message"] == message)
            .collect()
    }

    /// Records carrying the given correlation id.
    pub fn for_correlation_id(&self, id: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|record| record["correlation_id"] == id)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Store whose every call fails.
#[derive(Debug, Default)]
pub struct FailingStore;

impl FailingStore {
    fn error() -> StoreError {
        StoreError::Unavailable("connection refused".to_string())
    }
}

impl UserStore for FailingStore {
    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        future::ready(Err(Self::error())).boxed()
    }

    fn list_users(&self) -> BoxFuture<'_, Result<Vec<User>, StoreError>> {
        future::ready(Err(Self::error())).boxed()
    }

    fn get_user(&self, _id: i64) -> BoxFuture<'_, Result<Option<User>, StoreError>> {
        future::ready(Err(Self::error())).boxed()
    }

    fn create_user(&self, _user: NewUser) -> BoxFuture<'_, Result<User, StoreError>> {
        future::ready(Err(Self::error())).boxed()
    }
}

/// Memory store that counts how many resource calls reached it.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl UserStore for CountingStore {
    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.ping()
    }

    fn list_users(&self) -> BoxFuture<'_, Result<Vec<User>, StoreError>> {
        self.hit();
        self.inner.list_users()
    }

    fn get_user(&self, id: i64) -> BoxFuture<'_, Result<Option<User>, StoreError>> {
        self.hit();
        self.inner.get_user(id)
    }

    fn create_user(&self, user: NewUser) -> BoxFuture<'_, Result<User, StoreError>> {
        self.hit();
        self.inner.create_user(user)
    }
}

/// Memory store whose `list_users` takes `delay`.
#[derive(Debug)]
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
        }
    }
}

impl UserStore for SlowStore {
    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.ping()
    }

    fn list_users(&self) -> BoxFuture<'_, Result<Vec<User>, StoreError>> {
        let delay = self.delay;
        async move {
            tokio::time::sleep(delay).await;
            self.inner.list_users().await
        }
        .boxed()
    }

    fn get_user(&self, id: i64) -> BoxFuture<'_, Result<Option<User>, StoreError>> {
        self.inner.get_user(id)
    }

    fn create_user(&self, user: NewUser) -> BoxFuture<'_, Result<User, StoreError>> {
        self.inner.create_user(user)
    }
}

/// Store whose `list_users` panics while being polled.
#[derive(Debug, Default)]
pub struct PanickingStore;

impl UserStore for PanickingStore {
    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        future::ready(Ok(())).boxed()
    }

    fn list_users(&self) -> BoxFuture<'_, Result<Vec<User>, StoreError>> {
        async { panic!("list_users exploded") }.boxed()
    }

    fn get_user(&self, _id: i64) -> BoxFuture<'_, Result<Option<User>, StoreError>> {
        future::ready(Ok(None)).boxed()
    }

    fn create_user(&self, _user: NewUser) -> BoxFuture<'_, Result<User, StoreError>> {
        future::ready(Err(StoreError::Query("read only".to_string()))).boxed()
    }
}

/// Router plus the state it was built with, for in-process tests.
pub fn app(config: &ServiceConfig, store: Arc<dyn UserStore>) -> (axum::Router, AppState) {
    let state = AppState::new(config, store).unwrap();
    (build_router(config, state.clone()), state)
}
