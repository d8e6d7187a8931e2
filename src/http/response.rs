//! Response status capture.
//!
//! # Responsibilities
//! - Hold the status ultimately sent for one request (`StatusCapture`)
//! - Record it from the response path without altering the response
//!   (`StatusCaptureLayer`)
//!
//! # Design Decisions
//! - The cell defaults to 200 until a status is recorded, so a request whose
//!   future is dropped mid-flight still reports something
//! - Exactly one cell per request, created by the logging stage and placed in
//!   request extensions; outer stages read it after the inner ones return

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{Request, Response, StatusCode};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

/// Per-request status cell.
#[derive(Debug, Clone)]
pub struct StatusCapture(Arc<AtomicU16>);

impl StatusCapture {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU16::new(StatusCode::OK.as_u16())))
    }

    pub fn record(&self, status: StatusCode) {
        self.0.store(status.as_u16(), Ordering::Release);
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.load(Ordering::Acquire)).unwrap_or(StatusCode::OK)
    }
}

impl Default for StatusCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// Layer that records every response status into the request's
/// [`StatusCapture`], then passes the response through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCaptureLayer;

impl<S> Layer<S> for StatusCaptureLayer {
    type Service = StatusCaptureService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StatusCaptureService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct StatusCaptureService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for StatusCaptureService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let capture = request.extensions().get::<StatusCapture>().cloned();
        let future = self.inner.call(request);

        Box::pin(async move {
            let response = future.await?;
            if let Some(capture) = capture {
                capture.record(response.status());
            }
            Ok(response)
        })
    }
}
