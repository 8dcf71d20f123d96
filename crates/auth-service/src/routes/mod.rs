//! HTTP routes for the auth service.
//!
//! Defines the Axum router and application state.

use crate::auth::UserResolver;
use crate::config::{Config, ConfigError};
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_user};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Request user resolver (owns the key cache).
    pub resolver: Arc<UserResolver>,
}

impl AppState {
    /// Build state with the HTTP-backed verification stack.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the resolver rejects the configuration.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let resolver = Arc::new(UserResolver::from_config(&config)?);
        Ok(Self { config, resolver })
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/user` - Current user - requires read access
/// - `/api/v1/access/write/:role` - Write access check - requires a user
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - Request timeout from configuration
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (user resolution required)
    let protected_routes = Router::new()
        .route("/api/v1/user", get(handlers::get_user))
        .route(
            "/api/v1/access/write/:role",
            get(handlers::check_write_access),
        )
        .route_layer(middleware::from_fn_with_state(
            state.resolver.clone(),
            require_user,
        ));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
