//! Extractor for the authenticated caller.
//!
//! Routes behind `require_auth`/`require_admin` find the caller in request
//! extensions. Otherwise the bearer token is validated here.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::auth::{bearer_token, UserAuth};

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<UserAuth>() {
            return Ok(auth.clone());
        }

        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        UserAuth::validate(&state.jwt, token)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::user::UserRole;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_uses_caller_from_extensions() {
        let state = crate::app::tests::test_state();
        let auth = UserAuth {
            user_id: Uuid::new_v4(),
            role: UserRole::User,
            jti: "jti".to_string(),
            password_change_required: false,
        };
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/")
            .body(())
            .unwrap()
            .into_parts();
        parts.extensions.insert(auth.clone());

        let extracted = UserAuth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(extracted.user_id, auth.user_id);
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let state = crate::app::tests::test_state();
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/")
            .body(())
            .unwrap()
            .into_parts();

        let result = UserAuth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }
}
