//! Write access check handler.

use crate::auth::{validate_write_user, ResolvedUser};
use crate::errors::AuthError;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::Extension;
use tracing::instrument;

/// Handler for GET /api/v1/access/write/{role}
///
/// Returns 204 No Content if the user may write with `role` (holds it, holds
/// the generic write role, or is admin), 401 otherwise.
#[instrument(skip_all, name = "auth.handlers.write_access")]
pub async fn check_write_access(
    Extension(user): Extension<ResolvedUser>,
    Path(role): Path<String>,
) -> Result<StatusCode, AuthError> {
    validate_write_user(&user, &role)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::user::{ADMIN_ROLE, READ_ROLE};

    fn user(roles: &[&str]) -> Extension<ResolvedUser> {
        Extension(ResolvedUser::new("LX1", roles.iter().map(ToString::to_string)))
    }

    #[tokio::test]
    async fn test_specific_role_grants_access() {
        let status = check_write_access(
            user(&["Ratatieto_kirjoitus_x"]),
            Path("Ratatieto_kirjoitus_x".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_admin_grants_access() {
        let status = check_write_access(user(&[ADMIN_ROLE]), Path("anything".to_string()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_reader_denied() {
        let err = check_write_access(user(&[READ_ROLE]), Path("Ratatieto_kirjoitus_x".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
