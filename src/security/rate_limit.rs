//! Admission control via a process-wide token bucket.
//!
//! One bucket is shared by every client and every route; there is no per-IP
//! or per-route isolation. A denial is a normal outcome, not an error.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::config::RateLimitConfig;

/// Token bucket state. Invariant: `0.0 <= tokens <= burst`.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant, capacity: f64, refill_rate: f64) {
        // Callers sample the clock before taking the lock, so `now` may trail
        // the last refill slightly.
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    fn try_acquire(&mut self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        self.refill(now, capacity, refill_rate);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Process-wide admission controller.
///
/// Refill, capping and deduction happen under one lock so no caller ever
/// observes a half-updated bucket.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    refill_rate: f64,
    burst: f64,
}

impl RateLimiter {
    /// Create a limiter that starts with a full bucket.
    pub fn new(requests_per_second: f64, burst_size: u32) -> Self {
        let burst = f64::from(burst_size);
        Self {
            bucket: Mutex::new(TokenBucket::full(burst, Instant::now())),
            refill_rate: requests_per_second,
            burst,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }

    /// Decide whether one request may proceed, consuming a token if so.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// [`allow`](Self::allow) with an explicit clock reading.
    pub fn allow_at(&self, now: Instant) -> bool {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.try_acquire(now, self.burst, self.refill_rate)
    }

    /// Tokens currently available, after refilling up to `now`.
    pub fn available_at(&self, now: Instant) -> f64 {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.refill(now, self.burst, self.refill_rate);
        bucket.tokens
    }

    pub fn burst(&self) -> u32 {
        self.burst as u32
    }
}
