//! Request user resolution.
//!
//! Reads the token pair from the configured request headers, runs the
//! verifier and turns the result into a [`ResolvedUser`] or an
//! [`AuthError`]. When the mock user is enabled, verification is skipped
//! entirely.

use crate::auth::jwks::{HttpJwksTransport, KeySetFetcher};
use crate::auth::jwt::{TokenVerifier, Verification};
use crate::auth::key_cache::KeyCache;
use crate::auth::user::ResolvedUser;
use crate::config::{Config, ConfigError};
use crate::errors::AuthError;
use crate::observability::metrics;
use axum::http::HeaderMap;
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::instrument;

/// Resolves the authenticated user of a request.
pub struct UserResolver {
    verifier: Arc<TokenVerifier>,
    accepted_issuers: Vec<String>,
    access_token_header: String,
    data_token_header: String,
    mock_user_enabled: bool,
}

impl UserResolver {
    /// Create a resolver around an existing verifier.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMockUser` if the mock user is enabled in
    /// a production environment.
    pub fn new(verifier: Arc<TokenVerifier>, config: &Config) -> Result<Self, ConfigError> {
        if config.mock_user_enabled && config.environment.is_production() {
            return Err(ConfigError::InvalidMockUser(
                "mock user cannot be enabled in a production environment".to_string(),
            ));
        }

        if config.mock_user_enabled {
            tracing::warn!(
                target: "auth.resolver",
                environment = %config.environment,
                "Mock user enabled, token verification is bypassed"
            );
        }

        Ok(Self {
            verifier,
            accepted_issuers: config.accepted_issuers.clone(),
            access_token_header: config.access_token_header.clone(),
            data_token_header: config.data_token_header.clone(),
            mock_user_enabled: config.mock_user_enabled,
        })
    }

    /// Build the full verification stack (HTTP transport, cache, fetcher,
    /// verifier) from configuration.
    ///
    /// # Errors
    ///
    /// See [`UserResolver::new`].
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let transport = Arc::new(HttpJwksTransport::new(config.jwks_http_timeout));
        let fetcher = KeySetFetcher::new(
            transport,
            Arc::new(KeyCache::new()),
            config.jwks_retry_policy.clone(),
        );
        let verifier = Arc::new(TokenVerifier::new(Arc::new(fetcher)));
        Self::new(verifier, config)
    }

    pub fn verifier(&self) -> &Arc<TokenVerifier> {
        &self.verifier
    }

    pub fn accepted_issuers(&self) -> &[String] {
        &self.accepted_issuers
    }

    pub fn is_mock_user_enabled(&self) -> bool {
        self.mock_user_enabled
    }

    /// Resolve the user of a request from its headers.
    ///
    /// # Errors
    ///
    /// - `AuthError::Unauthenticated` - tokens missing or rejected
    /// - `AuthError::KeySetUnavailable` - issuer keys could not be fetched
    #[instrument(skip_all, name = "auth.resolver.resolve")]
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<ResolvedUser, AuthError> {
        if self.mock_user_enabled {
            tracing::debug!(target: "auth.resolver", "Returning mock user");
            metrics::record_token_validation("mock");
            return Ok(ResolvedUser::mock());
        }

        let access_token = header_secret(headers, &self.access_token_header);
        let data_token = header_secret(headers, &self.data_token_header);

        let verification = self
            .verifier
            .verify(
                access_token.as_ref().map(|t| t.expose_secret()),
                data_token.as_ref().map(|t| t.expose_secret()),
                &self.accepted_issuers,
            )
            .await;

        match verification {
            Ok(Verification::Authenticated(claims)) => {
                metrics::record_token_validation("authenticated");
                Ok(ResolvedUser::from_claims(&claims))
            }
            Ok(Verification::Rejected(reason)) => {
                metrics::record_token_validation(reason.as_str());
                Err(AuthError::Unauthenticated(
                    "The access token is invalid or expired".to_string(),
                ))
            }
            Err(e) => {
                metrics::record_token_validation("key_set_unavailable");
                Err(e.into())
            }
        }
    }
}

/// Read a header as a secret. Absent or non-ASCII values count as missing.
fn header_secret(headers: &HeaderMap, name: &str) -> Option<SecretString> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}
