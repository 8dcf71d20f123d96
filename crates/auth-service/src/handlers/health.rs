//! Health check handler.

/// Liveness probe handler.
///
/// Returns "OK" while the process is running. Does not touch the JWKS
/// endpoints; an unreachable issuer shows up as 500s on protected routes.
pub async fn health_check() -> &'static str {
    "OK"
}
