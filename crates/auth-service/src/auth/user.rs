//! Resolved user and capability checks.
//!
//! Handlers call [`validate_read_user`] / [`validate_write_user`] at the top
//! of any operation; a failed check is `AuthError::Forbidden`, which renders
//! as HTTP 401.

use crate::auth::claims::DataClaims;
use crate::errors::AuthError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Role granting read access to all content.
pub const READ_ROLE: &str = "Ratatieto_luku";

/// Role granting write access to every category.
pub const WRITE_ROLE: &str = "Ratatieto_kirjoitus";

/// Role granting administration rights (implies write everywhere).
pub const ADMIN_ROLE: &str = "Ratatieto_admin";

/// Identifier reported for the development mock user.
pub const MOCK_USER_UID: &str = "MOCK_USER";

/// Authenticated user for the duration of one request.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedUser {
    /// User identifier - redacted in Debug output.
    pub uid: String,

    /// Bare role names.
    pub roles: BTreeSet<String>,

    /// True only for the development bypass user.
    pub is_mock_user: bool,
}

impl fmt::Debug for ResolvedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedUser")
            .field("uid", &"[REDACTED]")
            .field("roles", &self.roles)
            .field("is_mock_user", &self.is_mock_user)
            .finish()
    }
}

impl ResolvedUser {
    pub fn new(uid: impl Into<String>, roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            uid: uid.into(),
            roles: roles.into_iter().collect(),
            is_mock_user: false,
        }
    }

    /// Build a user from verified data-token claims.
    pub fn from_claims(claims: &DataClaims) -> Self {
        Self::new(claims.uid.clone(), claims.role_set())
    }

    /// Fixed user returned when the mock bypass is enabled.
    pub fn mock() -> Self {
        Self {
            uid: MOCK_USER_UID.to_string(),
            roles: [READ_ROLE, WRITE_ROLE, ADMIN_ROLE]
                .iter()
                .map(ToString::to_string)
                .collect(),
            is_mock_user: true,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_read_user(&self) -> bool {
        self.has_role(READ_ROLE)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    /// Holds `write_role` or the generic write role.
    pub fn is_write_user(&self, write_role: &str) -> bool {
        self.has_role(write_role) || self.has_role(WRITE_ROLE)
    }
}

/// Require read access.
///
/// # Errors
///
/// Returns `AuthError::Forbidden` unless the user holds the read role.
pub fn validate_read_user(user: &ResolvedUser) -> Result<(), AuthError> {
    if user.is_read_user() {
        Ok(())
    } else {
        tracing::debug!(target: "auth.gate", "Read access denied");
        Err(AuthError::Forbidden("Read access required".to_string()))
    }
}

/// Require write access for `write_role`.
///
/// Admins pass regardless of `write_role`.
///
/// # Errors
///
/// Returns `AuthError::Forbidden` unless the user is admin or a write user.
pub fn validate_write_user(user: &ResolvedUser, write_role: &str) -> Result<(), AuthError> {
    if user.is_admin() || user.is_write_user(write_role) {
        Ok(())
    } else {
        tracing::debug!(target: "auth.gate", write_role = %write_role, "Write access denied");
        Err(AuthError::Forbidden("Write access required".to_string()))
    }
}
