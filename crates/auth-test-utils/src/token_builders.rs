//! Builder patterns for test token construction
//!
//! Provides fluent APIs for access-token claims and data tokens.

use base64::{engine::general_purpose::URL_SAFE, Engine};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

/// Builder for access-token claims
///
/// # Example
/// ```rust,ignore
/// let claims = AccessTokenBuilder::new(&issuer)
///     .expires_in(600)
///     .build();
/// let token = keypair.sign(&claims)?;
/// ```
pub struct AccessTokenBuilder {
    iss: String,
    token_use: String,
    sub: String,
    client_id: String,
    exp: i64,
    iat: i64,
}

impl AccessTokenBuilder {
    /// Create a new builder for tokens issued by `issuer`
    pub fn new(issuer: &str) -> Self {
        let now = Utc::now();
        Self {
            iss: issuer.to_string(),
            token_use: "access".to_string(),
            sub: "test-subject".to_string(),
            client_id: "test-client".to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Override the issuer claim
    pub fn issuer(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Set the `token_use` claim ("access", "id", ...)
    pub fn token_use(mut self, token_use: &str) -> Self {
        self.token_use = token_use.to_string();
        self
    }

    /// Set the subject
    pub fn subject(mut self, sub: &str) -> Self {
        self.sub = sub.to_string();
        self
    }

    /// Set expiration in seconds from now (negative for expired tokens)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        json!({
            "iss": self.iss,
            "token_use": self.token_use,
            "sub": self.sub,
            "client_id": self.client_id,
            "username": self.sub,
            "exp": self.exp,
            "iat": self.iat,
        })
    }
}

/// Builder for load-balancer style data tokens
///
/// The result is `header.payload.signature` with padded base64url segments
/// and a dummy signature; data tokens are never verified.
pub struct DataTokenBuilder {
    uid: String,
    roles: Option<Value>,
}

impl DataTokenBuilder {
    /// Create a data token for `uid` with no roles
    pub fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            roles: None,
        }
    }

    /// Set the raw role descriptor string (comma-separated, path-like)
    pub fn roles(mut self, roles: &str) -> Self {
        self.roles = Some(Value::String(roles.to_string()));
        self
    }

    /// Grant bare role names, each wrapped as `role/<name>`
    pub fn with_roles(self, roles: &[&str]) -> Self {
        let raw = roles
            .iter()
            .map(|role| format!("arn:aws:iam::000000000000:role/{role}"))
            .collect::<Vec<_>>()
            .join(",");
        self.roles(&raw)
    }

    /// Set a role claim of arbitrary JSON type (for malformed-claim tests)
    pub fn raw_roles(mut self, roles: Value) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Build the payload as a JSON value
    pub fn claims(&self) -> Value {
        let mut claims = json!({ "custom:uid": self.uid });
        if let (Some(roles), Some(map)) = (&self.roles, claims.as_object_mut()) {
            map.insert("custom:rooli".to_string(), roles.clone());
        }
        claims
    }

    /// Build the encoded data token
    pub fn build(self) -> String {
        let header = URL_SAFE.encode(r#"{"typ":"JWT","alg":"ES256"}"#);
        let payload = URL_SAFE.encode(self.claims().to_string());
        format!("{header}.{payload}.ZHVtbXktc2lnbmF0dXJl")
    }
}
