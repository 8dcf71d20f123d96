//! Metrics definitions for the auth service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: ~5 values (parameterized paths)
//! - `status`: fault kinds plus "success"
//! - `result`: hit, miss, expired
//! - `outcome`: authenticated, mock, rejection reasons, key_set_unavailable
//!
//! Issuer URLs are never used as labels.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // HTTP request buckets
        .set_buckets_for_metric(
            Matcher::Prefix("auth_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // JWKS fetch buckets, up to the default HTTP timeout
        .set_buckets_for_metric(
            Matcher::Prefix("auth_jwks_fetch".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `auth_http_requests_total`, `auth_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("auth_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("auth_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/metrics" | "/api/v1/user" => path.to_string(),
        _ if path.starts_with("/api/v1/access/write/") => "/api/v1/access/write/{role}".to_string(),
        // Unknown paths normalized to "/other" to bound cardinality
        _ => "/other".to_string(),
    }
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record one JWKS fetch attempt
///
/// Metric: `auth_jwks_fetch_total`, `auth_jwks_fetch_duration_seconds`
/// Labels: `status` ("success" or the fault kind)
pub fn record_jwks_fetch(status: &str, duration: Duration) {
    histogram!("auth_jwks_fetch_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("auth_jwks_fetch_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a key cache lookup
///
/// Metric: `auth_jwks_cache_total`
/// Labels: `result` (hit, miss, expired)
pub fn record_key_cache_lookup(result: &str) {
    counter!("auth_jwks_cache_total",
        "result" => result.to_string()
    )
    .increment(1);
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record the outcome of resolving a request's user
///
/// Metric: `auth_token_validations_total`
/// Labels: `outcome`
pub fn record_token_validation(outcome: &str) {
    counter!("auth_token_validations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Recording without an installed recorder goes to the no-op recorder;
    // these tests only exercise the call paths.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("GET", "/api/v1/user", 200, Duration::from_millis(40));
        record_http_request("GET", "/api/v1/user", 401, Duration::from_millis(3));
        record_http_request(
            "GET",
            "/api/v1/access/write/Ratatieto_kirjoitus",
            204,
            Duration::from_millis(20),
        );
        record_http_request("GET", "/api/v1/user", 504, Duration::from_secs(30));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(normalize_endpoint("/api/v1/user"), "/api/v1/user");
        assert_eq!(
            normalize_endpoint("/api/v1/access/write/Ratatieto_kirjoitus_x"),
            "/api/v1/access/write/{role}"
        );
        assert_eq!(normalize_endpoint("/api/v2/unknown"), "/other");
    }

    #[test]
    fn test_record_jwks_fetch() {
        record_jwks_fetch("success", Duration::from_millis(80));
        record_jwks_fetch("connection_reset", Duration::from_millis(3));
        record_jwks_fetch("timeout", Duration::from_secs(10));
    }

    #[test]
    fn test_record_key_cache_lookup() {
        record_key_cache_lookup("hit");
        record_key_cache_lookup("miss");
        record_key_cache_lookup("expired");
    }

    #[test]
    fn test_record_token_validation() {
        record_token_validation("authenticated");
        record_token_validation("untrusted_issuer");
        record_token_validation("key_set_unavailable");
    }
}
