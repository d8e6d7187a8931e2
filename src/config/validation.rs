//! Configuration validation.
//!
//! Semantic checks only; serde handles syntax. Validation is a pure function
//! that reports every violation, not just the first.

use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

use crate::config::schema::ServiceConfig;

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than zero",
        ));
    } else if config.listener.max_connections > Semaphore::MAX_PERMITS {
        errors.push(ValidationError::new(
            "listener.max_connections",
            format!("must not exceed {}", Semaphore::MAX_PERMITS),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new(
            "listener.max_body_bytes",
            "must be greater than zero",
        ));
    }

    let rps = config.rate_limit.requests_per_second;
    if !rps.is_finite() || rps <= 0.0 {
        errors.push(ValidationError::new(
            "rate_limit.requests_per_second",
            format!("must be a positive number, got {rps}"),
        ));
    }
    if config.rate_limit.burst_size == 0 {
        errors.push(ValidationError::new(
            "rate_limit.burst_size",
            "must be at least 1",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must be greater than zero",
        ));
    }
    if config.timeouts.shutdown_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.shutdown_secs",
            "must be greater than zero",
        ));
    }

    if let Err(e) = EnvFilter::try_new(&config.logging.level) {
        errors.push(ValidationError::new(
            "logging.level",
            format!("invalid filter `{}`: {e}", config.logging.level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
