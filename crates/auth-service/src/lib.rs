//! Auth Service Library
//!
//! Access-token validation for the extranet backend. The load balancer in
//! front of the service authenticates users against the identity provider
//! and forwards two tokens on every request:
//!
//! - an RS256-signed access token, verified here against the issuer's JWKS
//! - a data token carrying the user id and roles, decoded without
//!   verification once the access token checks out
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/resolver.rs
//!     -> auth/jwt.rs -> auth/jwks.rs -> auth/key_cache.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Key cache, JWKS fetcher, token verifier, claims, capability checks
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - User resolution and HTTP metrics middleware
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
