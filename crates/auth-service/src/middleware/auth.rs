//! Authentication middleware for protected routes.
//!
//! Resolves the request user from the load balancer's token headers and
//! injects the [`ResolvedUser`] into request extensions.

use crate::auth::{ResolvedUser, UserResolver};
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Middleware that resolves the request user.
///
/// # Response
///
/// - 401 Unauthorized with WWW-Authenticate header if the tokens are missing
///   or rejected
/// - 500 Internal Server Error if the issuer's keys cannot be fetched
/// - Otherwise continues with the `ResolvedUser` in extensions
#[instrument(skip_all, name = "auth.middleware.require_user")]
pub async fn require_user(
    State(resolver): State<Arc<UserResolver>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    let user = resolver.resolve(req.headers()).await.map_err(|e| {
        tracing::debug!(target: "auth.middleware", error = %e, "User resolution failed");
        e
    })?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Extension trait for extracting the resolved user from a request.
pub trait UserExt {
    /// Get the resolved user from request extensions.
    ///
    /// Returns `None` if the auth middleware was not applied to this request.
    fn user(&self) -> Option<&ResolvedUser>;
}

impl<B> UserExt for axum::extract::Request<B> {
    fn user(&self) -> Option<&ResolvedUser> {
        self.extensions().get::<ResolvedUser>()
    }
}
