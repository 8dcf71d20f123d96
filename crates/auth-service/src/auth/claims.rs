//! Token claim structures.
//!
//! `AccessClaims` come out of a signature-verified access token. `DataClaims`
//! come out of the companion data token, which is only base64-decoded. The
//! user identifier is redacted in Debug output of both.

use common::jwt::{decode_unverified_payload, JwtValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Required value of the `token_use` claim on access tokens.
pub const ACCESS_TOKEN_USE: &str = "access";

/// Claims of a verified access token.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Issuer URL; checked against the issuer used for key lookup.
    pub iss: String,

    /// "access" for access tokens, "id" for ID tokens.
    pub token_use: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Subject - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Username - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl fmt::Debug for AccessClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessClaims")
            .field("iss", &self.iss)
            .field("token_use", &self.token_use)
            .field("exp", &self.exp)
            .field("sub", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("username", &"[REDACTED]")
            .field("iat", &self.iat)
            .finish()
    }
}

impl AccessClaims {
    pub fn is_access_token(&self) -> bool {
        self.token_use == ACCESS_TOKEN_USE
    }
}

/// User claims carried by the data token.
///
/// The load balancer emits the custom attribute names (`custom:uid`,
/// `custom:rooli`); plain `uid` / `roles` are accepted as aliases.
#[derive(Clone, Serialize, Deserialize)]
pub struct DataClaims {
    /// User identifier - redacted in Debug output.
    #[serde(rename = "custom:uid", alias = "uid")]
    pub uid: String,

    /// Raw role descriptor claim. Kept untyped so a malformed value degrades
    /// to no roles instead of rejecting the whole token.
    #[serde(
        rename = "custom:rooli",
        alias = "roles",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub roles: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl fmt::Debug for DataClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataClaims")
            .field("uid", &"[REDACTED]")
            .field("roles", &self.roles)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl DataClaims {
    /// Decode the payload segment of a data token. No signature check.
    ///
    /// # Errors
    ///
    /// Returns `JwtValidationError` when the token is oversized, has fewer
    /// than two segments, or its payload lacks a `uid`.
    pub fn decode(data_token: &str) -> Result<Self, JwtValidationError> {
        let claims: Self = decode_unverified_payload(data_token)?;
        if claims.uid.trim().is_empty() {
            tracing::debug!(target: "auth.claims", "Data token has empty uid");
            return Err(JwtValidationError::MalformedToken);
        }
        Ok(claims)
    }

    /// Bare role names granted by this token.
    ///
    /// Missing or non-string role claims give an empty set.
    pub fn role_set(&self) -> BTreeSet<String> {
        match &self.roles {
            Some(serde_json::Value::String(raw)) => parse_roles(raw),
            Some(other) => {
                tracing::warn!(
                    target: "auth.claims",
                    claim_type = json_type_name(other),
                    "Role claim is not a string, treating user as having no roles"
                );
                BTreeSet::new()
            }
            None => BTreeSet::new(),
        }
    }
}

/// Parse a role descriptor string into bare role names.
///
/// Backslash escapes are removed, the string is split on `,`, and each piece
/// keeps only the text after its last `/`. Empty results are dropped.
///
/// ```
/// use auth_service::auth::claims::parse_roles;
///
/// let roles = parse_roles("arn:aws:iam::1:role/Ratatieto_luku,a/b/Ratatieto_admin");
/// assert!(roles.contains("Ratatieto_luku"));
/// assert!(roles.contains("Ratatieto_admin"));
/// ```
pub fn parse_roles(raw: &str) -> BTreeSet<String> {
    raw.replace('\\', "")
        .split(',')
        .filter_map(|piece| piece.rsplit('/').next())
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
