//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidEnv {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: TOML file (if given), then environment overrides,
/// then validation.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => ServiceConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML configuration file without validating it.
pub fn read_config_file(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` returns the raw value for a variable name. Unset and empty
/// variables leave the current value alone.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("HOST") {
        config.listener.host = v;
    }
    if let Some(v) = get("PORT") {
        config.listener.port = parse_env("PORT", v)?;
    }
    if let Some(v) = get("MAX_CONNECTIONS") {
        config.listener.max_connections = parse_env("MAX_CONNECTIONS", v)?;
    }

    if let Some(v) = get("LOG_LEVEL") {
        config.logging.level = v;
    }
    if let Some(v) = get("LOG_FORMAT") {
        config.logging.format = parse_env("LOG_FORMAT", v)?;
    }

    if let Some(v) = get("RATE_LIMIT_RPS") {
        config.rate_limit.requests_per_second = parse_env("RATE_LIMIT_RPS", v)?;
    }
    if let Some(v) = get("RATE_LIMIT_BURST") {
        config.rate_limit.burst_size = parse_env("RATE_LIMIT_BURST", v)?;
    }

    if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
        config.timeouts.request_secs = parse_env("REQUEST_TIMEOUT_SECS", v)?;
    }
    if let Some(v) = get("SHUTDOWN_TIMEOUT_SECS") {
        config.timeouts.shutdown_secs = parse_env("SHUTDOWN_TIMEOUT_SECS", v)?;
    }

    if let Some(v) = get("DB_HOST") {
        config.database.host = v;
    }
    if let Some(v) = get("DB_PORT") {
        config.database.port = parse_env("DB_PORT", v)?;
    }
    if let Some(v) = get("DB_NAME") {
        config.database.name = v;
    }
    if let Some(v) = get("DB_USER") {
        config.database.user = v;
    }
    if let Some(v) = get("DB_PASSWORD") {
        config.database.password = v;
    }
    if let Some(v) = get("DB_SSL_MODE") {
        config.database.ssl_mode = v;
    }

    Ok(())
}

fn parse_env<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnv {
            key,
            reason: e.to_string(),
            value,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let mut config = ServiceConfig::default();
        apply_env_overrides(
            &mut config,
            lookup(&[
                ("PORT", "9090"),
                ("LOG_LEVEL", "debug"),
                ("LOG_FORMAT", "pretty"),
                ("RATE_LIMIT_RPS", "2.5"),
                ("RATE_LIMIT_BURST", "4"),
                ("DB_HOST", "db.internal"),
                ("DB_SSL_MODE", "disable"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.port, 9090);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.rate_limit.requests_per_second, 2.5);
        assert_eq!(config.rate_limit.burst_size, 4);
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.ssl_mode, "disable");
    }

    #[test]
    fn empty_variables_are_ignored() {
        let mut config = ServiceConfig::default();
        apply_env_overrides(&mut config, lookup(&[("PORT", ""), ("DB_HOST", "  ")])).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn unparsable_number_names_the_variable() {
        let mut config = ServiceConfig::default();
        let err = apply_env_overrides(&mut config, lookup(&[("DB_PORT", "five")])).unwrap_err();
        match err {
            ConfigError::InvalidEnv { key, value, .. } => {
                assert_eq!(key, "DB_PORT");
                assert_eq!(value, "five");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_config_file(Path::new("/nonexistent/user-service.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
