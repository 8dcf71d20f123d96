//! Observability module for the auth service.
//!
//! Provides metrics definitions and the HTTP metrics middleware.

pub mod metrics;
