//! Access-token verification.
//!
//! Verifies an access token against the key set of its issuer and, on
//! success, returns the claims of the companion data token.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The issuer is checked against the allow-list before any key fetch
//! - Only RS256 is accepted; the header's `alg` is informational
//! - `exp` and `iss` are validated by `jsonwebtoken`, `token_use` here
//! - Rejection reasons are logged at debug level only

use crate::auth::claims::{AccessClaims, DataClaims};
use crate::auth::jwks::{FetchError, KeySetFetcher};
use crate::auth::key_cache::KeySet;
use common::jwt::{peek_header, peek_payload, JwtValidationError};
use jsonwebtoken::{decode, Algorithm, Validation};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Outcome of a verification that did not hit an infrastructure failure.
#[derive(Debug, Clone)]
pub enum Verification {
    /// Access token verified; claims of the data token.
    Authenticated(DataClaims),

    /// Token pair refused.
    Rejected(Rejection),
}

impl Verification {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Verification::Authenticated(_))
    }

    /// Claims of an authenticated verification.
    pub fn claims(&self) -> Option<&DataClaims> {
        match self {
            Verification::Authenticated(claims) => Some(claims),
            Verification::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Verification::Authenticated(_) => None,
            Verification::Rejected(reason) => Some(*reason),
        }
    }
}

/// Why a token pair was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Access or data token absent.
    MissingToken,
    /// Oversized, too few segments, or undecodable header/payload.
    MalformedToken,
    /// `iss` not in the accepted issuer list.
    UntrustedIssuer,
    /// `kid` not in the issuer's key set, even after a refetch.
    UnknownKey,
    /// Signature, `exp` or `iss` validation failed.
    InvalidSignature,
    /// `token_use` is not "access".
    WrongTokenUse,
    /// Data token payload could not be decoded.
    MalformedDataToken,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::MissingToken => "missing_token",
            Rejection::MalformedToken => "malformed_token",
            Rejection::UntrustedIssuer => "untrusted_issuer",
            Rejection::UnknownKey => "unknown_key",
            Rejection::InvalidSignature => "invalid_signature",
            Rejection::WrongTokenUse => "wrong_token_use",
            Rejection::MalformedDataToken => "malformed_data_token",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<JwtValidationError> for Rejection {
    fn from(_: JwtValidationError) -> Self {
        Rejection::MalformedToken
    }
}

/// Token verifier backed by a [`KeySetFetcher`].
pub struct TokenVerifier {
    fetcher: Arc<KeySetFetcher>,
}

impl TokenVerifier {
    pub fn new(fetcher: Arc<KeySetFetcher>) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Arc<KeySetFetcher> {
        &self.fetcher
    }

    /// Verify an access token and decode its data token.
    ///
    /// # Steps
    ///
    /// 1. Both tokens present; access token within size limit and has at
    ///    least two segments
    /// 2. Unverified decode of header (`kid`) and payload (`iss`)
    /// 3. `iss` in `accepted_issuers`
    /// 4. Key lookup; an unknown `kid` invalidates and refetches once
    /// 5. RS256 signature, `exp` and `iss`
    /// 6. `token_use == "access"`
    /// 7. Unverified decode of the data token payload
    ///
    /// # Errors
    ///
    /// Returns `FetchError` only when the issuer's key set cannot be
    /// fetched. Every other failure is `Ok(Verification::Rejected(_))`.
    #[instrument(skip_all)]
    pub async fn verify(
        &self,
        access_token: Option<&str>,
        data_token: Option<&str>,
        accepted_issuers: &[String],
    ) -> Result<Verification, FetchError> {
        // 1. Presence
        let (Some(access_token), Some(data_token)) = (
            access_token.filter(|t| !t.is_empty()),
            data_token.filter(|t| !t.is_empty()),
        ) else {
            return Ok(reject(Rejection::MissingToken));
        };

        // 2. Unverified header and payload (size and segment checks included)
        let (kid, issuer) = match peek_header(access_token)
            .and_then(|header| peek_payload(access_token).map(|payload| (header.kid, payload.iss)))
        {
            Ok(parts) => parts,
            Err(e) => {
                tracing::debug!(target: "auth.jwt", error = ?e, "Access token structure invalid");
                return Ok(reject(e.into()));
            }
        };

        // 3. Issuer allow-list, before any network access
        if !accepted_issuers.iter().any(|accepted| *accepted == issuer) {
            tracing::debug!(target: "auth.jwt", issuer = %issuer, "Issuer not accepted");
            return Ok(reject(Rejection::UntrustedIssuer));
        }

        // 4. Key resolution with a single refetch on unknown kid
        let mut key_set = self.fetcher.key_set(&issuer).await?;
        if !key_set.contains(&kid) {
            tracing::info!(
                target: "auth.jwt",
                issuer = %issuer,
                kid = %kid,
                "Unknown kid, refetching key set"
            );
            key_set = self.fetcher.refetch(&issuer).await?;
        }

        // 5. Signature and static claims
        let claims = match verify_signature(access_token, &kid, &issuer, &key_set) {
            Ok(claims) => claims,
            Err(rejection) => return Ok(reject(rejection)),
        };

        // 6. Token use
        if !claims.is_access_token() {
            tracing::debug!(target: "auth.jwt", token_use = %claims.token_use, "Token is not an access token");
            return Ok(reject(Rejection::WrongTokenUse));
        }

        // 7. Data token
        match DataClaims::decode(data_token) {
            Ok(data_claims) => {
                tracing::debug!(target: "auth.jwt", "Token validated successfully");
                Ok(Verification::Authenticated(data_claims))
            }
            Err(e) => {
                tracing::debug!(target: "auth.jwt", error = ?e, "Data token could not be decoded");
                Ok(reject(Rejection::MalformedDataToken))
            }
        }
    }
}

fn reject(reason: Rejection) -> Verification {
    tracing::debug!(target: "auth.jwt", reason = %reason, "Token rejected");
    Verification::Rejected(reason)
}

/// Verify the RS256 signature with the key named by `kid`.
fn verify_signature(
    token: &str,
    kid: &str,
    issuer: &str,
    key_set: &KeySet,
) -> Result<AccessClaims, Rejection> {
    let Some(decoding_key) = key_set.get(kid) else {
        tracing::warn!(target: "auth.jwt", kid = %kid, "Key not found in refreshed key set");
        return Err(Rejection::UnknownKey);
    };

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "iss"]);
    // Access tokens carry client_id instead of aud
    validation.validate_aud = false;

    decode::<AccessClaims>(token, decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(target: "auth.jwt", error = %e, "Token verification failed");
            Rejection::InvalidSignature
        })
}
