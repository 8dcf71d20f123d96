//! Current user handler.

use crate::auth::{validate_read_user, ResolvedUser};
use crate::errors::AuthError;
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /api/v1/user
///
/// Returns the resolved user. Requires read access.
///
/// ## Response
///
/// ```json
/// {
///   "uid": "LX123456",
///   "roles": ["Ratatieto_luku"],
///   "is_mock_user": false
/// }
/// ```
#[instrument(skip_all, name = "auth.handlers.user")]
pub async fn get_user(
    Extension(user): Extension<ResolvedUser>,
) -> Result<Json<ResolvedUser>, AuthError> {
    validate_read_user(&user)?;
    Ok(Json(user))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::user::READ_ROLE;

    #[tokio::test]
    async fn test_get_user_requires_read_role() {
        let reader = ResolvedUser::new("LX1", [READ_ROLE.to_string()]);
        let Json(body) = get_user(Extension(reader.clone())).await.unwrap();
        assert_eq!(body, reader);

        let nobody = ResolvedUser::new("LX2", Vec::new());
        let err = get_user(Extension(nobody)).await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }
}
