//! Auth service configuration.
//!
//! Configuration is loaded from environment variables. The service holds no
//! secrets of its own; the issuer list and header names are shown in Debug
//! output.

use crate::auth::jwks::{FaultKind, RetryPolicy, DEFAULT_HTTP_TIMEOUT, DEFAULT_MAX_ATTEMPTS};
use axum::http::HeaderName;
use common::config::{Environment, ObservabilityConfig};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default request header carrying the access token.
pub const DEFAULT_ACCESS_TOKEN_HEADER: &str = "x-iam-accesstoken";

/// Default request header carrying the data token.
pub const DEFAULT_DATA_TOKEN_HEADER: &str = "x-iam-data";

/// Default request timeout for the HTTP surface.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Upper bound for `JWKS_HTTP_TIMEOUT_SECONDS`.
pub const MAX_JWKS_HTTP_TIMEOUT_SECONDS: u64 = 60;

/// Upper bound for `JWKS_FETCH_MAX_ATTEMPTS`.
pub const MAX_JWKS_FETCH_ATTEMPTS: u32 = 10;

/// Default `EnvFilter` directive for the service binary.
pub const DEFAULT_LOG_FILTER: &str = "auth_service=debug,tower_http=debug";

/// Auth service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Issuer URLs whose tokens are accepted. Never empty.
    pub accepted_issuers: Vec<String>,

    /// Header carrying the access token (lowercase).
    pub access_token_header: String,

    /// Header carrying the data token (lowercase).
    pub data_token_header: String,

    /// Deployment environment (default: production).
    pub environment: Environment,

    /// Serve the fixed mock user instead of verifying tokens.
    /// Never true in production.
    pub mock_user_enabled: bool,

    /// Timeout for a single JWKS request.
    pub jwks_http_timeout: Duration,

    /// Retry policy for JWKS fetches.
    pub jwks_retry_policy: RetryPolicy,

    /// Request timeout for the HTTP surface.
    pub request_timeout: Duration,

    /// Logging setup.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid accepted issuers configuration: {0}")]
    InvalidIssuers(String),

    #[error("Invalid header name configuration: {0}")]
    InvalidHeaderName(String),

    #[error("Invalid deployment environment: {0}")]
    InvalidEnvironment(String),

    #[error("Invalid mock user configuration: {0}")]
    InvalidMockUser(String),

    #[error("Invalid JWKS configuration: {0}")]
    InvalidJwks(String),

    #[error("Invalid request timeout configuration: {0}")]
    InvalidRequestTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let issuers_raw = vars
            .get("ACCEPTED_ISSUERS")
            .ok_or_else(|| ConfigError::MissingEnvVar("ACCEPTED_ISSUERS".to_string()))?;
        let accepted_issuers = parse_issuers(issuers_raw)?;

        let access_token_header =
            parse_header_name(vars, "ACCESS_TOKEN_HEADER", DEFAULT_ACCESS_TOKEN_HEADER)?;
        let data_token_header =
            parse_header_name(vars, "DATA_TOKEN_HEADER", DEFAULT_DATA_TOKEN_HEADER)?;
        if access_token_header == data_token_header {
            return Err(ConfigError::InvalidHeaderName(
                "ACCESS_TOKEN_HEADER and DATA_TOKEN_HEADER must differ".to_string(),
            ));
        }

        let environment = match vars.get("DEPLOY_ENVIRONMENT") {
            Some(value) => Environment::parse(value).ok_or_else(|| {
                ConfigError::InvalidEnvironment(format!(
                    "DEPLOY_ENVIRONMENT must be one of local, dev, test, production, got '{}'",
                    value
                ))
            })?,
            None => Environment::Production,
        };

        let mock_user_enabled = match vars.get("MOCK_USER_ENABLED") {
            Some(value) => parse_bool(value).ok_or_else(|| {
                ConfigError::InvalidMockUser(format!(
                    "MOCK_USER_ENABLED must be true or false, got '{}'",
                    value
                ))
            })?,
            None => false,
        };

        if mock_user_enabled && environment.is_production() {
            return Err(ConfigError::InvalidMockUser(
                "MOCK_USER_ENABLED cannot be set in a production environment".to_string(),
            ));
        }

        // Parse JWKS HTTP timeout with validation
        let jwks_http_timeout = if let Some(value_str) = vars.get("JWKS_HTTP_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwks(format!(
                    "JWKS_HTTP_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_JWKS_HTTP_TIMEOUT_SECONDS {
                return Err(ConfigError::InvalidJwks(format!(
                    "JWKS_HTTP_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                    MAX_JWKS_HTTP_TIMEOUT_SECONDS, value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_HTTP_TIMEOUT
        };

        // Parse JWKS attempt budget with validation
        let max_attempts = if let Some(value_str) = vars.get("JWKS_FETCH_MAX_ATTEMPTS") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwks(format!(
                    "JWKS_FETCH_MAX_ATTEMPTS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_JWKS_FETCH_ATTEMPTS {
                return Err(ConfigError::InvalidJwks(format!(
                    "JWKS_FETCH_MAX_ATTEMPTS must be between 1 and {}, got {}",
                    MAX_JWKS_FETCH_ATTEMPTS, value
                )));
            }

            value
        } else {
            DEFAULT_MAX_ATTEMPTS
        };

        let jwks_retry_policy = match vars.get("JWKS_TRANSIENT_FAULTS") {
            Some(value) => RetryPolicy::new(max_attempts, parse_fault_kinds(value)?),
            None => RetryPolicy::new(
                max_attempts,
                [FaultKind::ConnectionReset, FaultKind::BrokenPipe],
            ),
        };

        // Parse request timeout with validation
        let request_timeout = if let Some(value_str) = vars.get("REQUEST_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidRequestTimeout(format!(
                    "REQUEST_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidRequestTimeout(
                    "REQUEST_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            Duration::from_secs(value)
        } else {
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS)
        };

        let observability = ObservabilityConfig::from_vars(vars, DEFAULT_LOG_FILTER);

        Ok(Config {
            bind_address,
            accepted_issuers,
            access_token_header,
            data_token_header,
            environment,
            mock_user_enabled,
            jwks_http_timeout,
            jwks_retry_policy,
            request_timeout,
            observability,
        })
    }
}

fn parse_issuers(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut issuers: Vec<String> = Vec::new();
    for issuer in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !issuer.starts_with("https://") && !issuer.starts_with("http://") {
            return Err(ConfigError::InvalidIssuers(format!(
                "issuer must be an http(s) URL, got '{}'",
                issuer
            )));
        }
        if !issuers.iter().any(|existing| existing == issuer) {
            issuers.push(issuer.to_string());
        }
    }

    if issuers.is_empty() {
        return Err(ConfigError::InvalidIssuers(
            "ACCEPTED_ISSUERS must list at least one issuer".to_string(),
        ));
    }

    Ok(issuers)
}

fn parse_fault_kinds(raw: &str) -> Result<Vec<FaultKind>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            FaultKind::from_config_name(name).ok_or_else(|| {
                ConfigError::InvalidJwks(format!(
                    "JWKS_TRANSIENT_FAULTS entries must be connection_reset, connection_aborted, broken_pipe, timeout or server_error, got '{}'",
                    name
                ))
            })
        })
        .collect()
}

fn parse_header_name(
    vars: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<String, ConfigError> {
    let name = vars
        .get(key)
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string());

    HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
        ConfigError::InvalidHeaderName(format!("{} is not a valid header name, got '{}': {}", key, name, e))
    })?;

    Ok(name)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
