//! Middleware for the auth service.
//!
//! # Components
//!
//! - `auth` - User resolution for protected routes
//! - `http_metrics` - HTTP request metrics middleware

pub mod auth;
pub mod http_metrics;

pub use auth::{require_user, UserExt};
pub use http_metrics::http_metrics_middleware;
