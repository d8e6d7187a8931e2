//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Build the Axum router: resources, ops endpoints, request pipeline
//! - Bind the listener and run the accept loop (HTTP/1.1 and HTTP/2)
//! - Drain in-flight connections on shutdown, forcing them closed after the
//!   deadline

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, DefaultBodyLimit},
    http::StatusCode,
    middleware,
    routing::get,
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::{conn::auto, graceful::GracefulShutdown},
};
use metrics_exporter_prometheus::BuildError;
use tokio::{sync::broadcast, task::JoinHandle, task::JoinSet};
use tower::{ServiceBuilder, ServiceExt};
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer};

use crate::config::ServiceConfig;
use crate::handlers;
use crate::http::middleware::{admit, observe_request, track_metrics};
use crate::http::response::StatusCaptureLayer;
use crate::lifecycle::{Lifecycle, LifecycleState, Shutdown, ShutdownOutcome, TransitionError};
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics::HttpMetrics;
use crate::security::RateLimiter;
use crate::store::UserStore;

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Application state injected into handlers and pipeline stages.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub metrics: Arc<HttpMetrics>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: &ServiceConfig, store: Arc<dyn UserStore>) -> Result<Self, BuildError> {
        Ok(Self {
            store,
            metrics: Arc::new(HttpMetrics::new()?),
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("metrics", &self.metrics)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

/// Build the Axum router with the full request pipeline.
///
/// Every route (including unmatched ones) runs through logging, metrics and
/// status capture. Only `/api` routes pass admission control.
#[allow(deprecated)]
pub fn build_router(config: &ServiceConfig, state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route("/users/{id}", get(handlers::users::get_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), admit));

    let pipeline = ServiceBuilder::new()
        .layer(middleware::from_fn(observe_request))
        .layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .layer(StatusCaptureLayer)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TimeoutLayer::new(config.timeouts.request()))
        .layer(DefaultBodyLimit::max(config.listener.max_body_bytes));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::metrics::render_metrics))
        .nest("/api", api)
        .fallback(not_found)
        .with_state(state)
        .layer(pipeline)
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

fn handle_panic(panic: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");

    axum::response::IntoResponse::into_response((
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
    ))
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Lifecycle(#[from] TransitionError),
}

/// HTTP server that has not started yet.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    state: AppState,
    lifecycle: Lifecycle,
}

impl HttpServer {
    pub fn new(config: ServiceConfig, state: AppState) -> Self {
        let router = build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Lifecycle handle, valid before and after `start`.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Bind and begin serving. Returns once the listener accepts connections.
    pub async fn start(self) -> Result<RunningServer, StartupError> {
        let listener = match Listener::bind(&self.config.listener).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(error = %e, "Server startup failed");
                self.lifecycle.transition(LifecycleState::Stopped)?;
                return Err(e.into());
            }
        };

        let local_addr = listener.local_addr();
        let shutdown = Shutdown::new();
        let tracker = ConnectionTracker::new();

        let task = tokio::spawn(accept_loop(
            listener,
            self.router,
            shutdown.subscribe(),
            tracker.clone(),
        ));
        let upkeep = tokio::spawn(metrics_upkeep(
            Arc::clone(&self.state.metrics),
            shutdown.subscribe(),
        ));

        self.lifecycle.transition(LifecycleState::Serving)?;
        tracing::info!(
            address = %local_addr,
            version = env!("CARGO_PKG_VERSION"),
            "Server started"
        );

        Ok(RunningServer {
            local_addr,
            lifecycle: self.lifecycle,
            shutdown,
            tracker,
            task,
            upkeep,
        })
    }
}

/// A server accepting connections.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    lifecycle: Lifecycle,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    task: JoinHandle<()>,
    upkeep: JoinHandle<()>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.current()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// Open connections right now.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop accepting, drain in-flight connections, force-close whatever is
    /// left after `timeout`.
    pub async fn shutdown(self, timeout: Duration) -> ShutdownOutcome {
        self.shutdown_or_force(timeout, std::future::pending()).await
    }

    /// Like [`shutdown`](Self::shutdown), but `force` resolving also ends the
    /// drain early (a second signal from the operator).
    pub async fn shutdown_or_force<F>(mut self, timeout: Duration, force: F) -> ShutdownOutcome
    where
        F: Future<Output = ()>,
    {
        if let Err(e) = self.lifecycle.transition(LifecycleState::Draining) {
            tracing::warn!(error = %e, "Shutdown requested in unexpected state");
        }
        tracing::info!(
            timeout_secs = timeout.as_secs_f64(),
            active_connections = self.tracker.active_count(),
            "Draining connections"
        );
        self.shutdown.trigger();

        let finished = tokio::select! {
            joined = &mut self.task => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Accept loop terminated abnormally");
                }
                true
            }
            _ = tokio::time::sleep(timeout) => false,
            _ = force => false,
        };

        let outcome = if finished {
            ShutdownOutcome::Graceful
        } else {
            let abandoned = self.tracker.active_count();
            self.task.abort();
            let _ = (&mut self.task).await;
            tracing::warn!(abandoned, "Forced shutdown");
            ShutdownOutcome::Forced { abandoned }
        };

        self.upkeep.abort();
        if let Err(e) = self.lifecycle.transition(LifecycleState::Stopped) {
            tracing::warn!(error = %e, "Stop requested in unexpected state");
        }
        tracing::info!(graceful = outcome.is_graceful(), "Server stopped");
        outcome
    }
}

/// Accept until drained, then wait for open connections to finish.
///
/// Dropping this future (abort) drops the `JoinSet`, which cancels every
/// connection task still running.
async fn accept_loop(
    listener: Listener,
    app: Router,
    mut drain: broadcast::Receiver<()>,
    tracker: ConnectionTracker,
) {
    let builder = auto::Builder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = drain.recv() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => {
                let (stream, remote, permit) = match accepted {
                    Ok(accepted) => accepted,
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        let backoff = e.accept_backoff();
                        tracing::warn!(error = %e, backoff = ?backoff, "Accept failed");
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                };

                let app = app.clone();
                let service = hyper::service::service_fn(move |mut request: hyper::Request<Incoming>| {
                    request.extensions_mut().insert(ConnectInfo(remote));
                    app.clone().oneshot(request)
                });

                let guard = tracker.track(remote);
                let connection = builder
                    .serve_connection_with_upgrades(TokioIo::new(stream), service)
                    .into_owned();
                let connection = graceful.watch(connection);

                connections.spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::debug!(connection_id = %guard.id(), error = %e, "Connection error");
                    }
                    drop(permit);
                    drop(guard);
                });
            }
        }
    }

    drop(listener);
    tracing::info!(open_connections = tracker.active_count(), "Listener closed");

    graceful.shutdown().await;
    while connections.join_next().await.is_some() {}
}

async fn metrics_upkeep(metrics: Arc<HttpMetrics>, mut stop: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = stop.recv() => break,
            _ = interval.tick() => metrics.run_upkeep(),
        }
    }
}
