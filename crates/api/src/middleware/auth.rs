//! Bearer token authentication middleware.
//!
//! `require_auth` admits any valid access token. `require_admin` also
//! requires the ADMIN role and refuses admins that still have to rotate a
//! temporary password.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use domain::models::user::UserRole;
use serde_json::json;
use shared::jwt::{extract_user_id, JwtConfig, JwtError};
use uuid::Uuid;

use crate::app::AppState;

/// Authenticated caller, decoded from the access token.
#[derive(Debug, Clone)]
pub struct UserAuth {
    pub user_id: Uuid,
    pub role: UserRole,
    /// JWT ID (jti) for log correlation.
    pub jti: String,
    pub password_change_required: bool,
}

impl UserAuth {
    /// Validates an access token and returns the caller it names.
    pub fn validate(jwt: &JwtConfig, token: &str) -> Result<Self, JwtError> {
        let claims = jwt.validate_access_token(token)?;
        let user_id = extract_user_id(&claims)?;
        let role = claims
            .role
            .parse::<UserRole>()
            .map_err(|_| JwtError::InvalidToken)?;

        Ok(UserAuth {
            user_id,
            role,
            jti: claims.jti,
            password_change_required: claims.pwd_change_required,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn authenticate(state: &AppState, req: &Request<Body>) -> Result<UserAuth, Response> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| unauthorized_response("Missing or invalid Authorization header"))?;

    UserAuth::validate(&state.jwt, token).map_err(|e| {
        tracing::debug!("JWT validation failed: {}", e);
        unauthorized_response("Invalid or expired token")
    })
}

/// Middleware that requires a valid access token.
///
/// The caller is stored in request extensions for downstream handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, &req) {
        Ok(auth) => {
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(response) => response,
    }
}

/// Middleware for admin-only routes.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth = match authenticate(&state, &req) {
        Ok(auth) => auth,
        Err(response) => return response,
    };

    if !auth.is_admin() {
        return forbidden_response("Admin access required");
    }
    if auth.password_change_required {
        return forbidden_response("Password change required before continuing");
    }

    req.extensions_mut().insert(auth);
    next.run(req).await
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

fn forbidden_response(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": "forbidden",
            "message": message
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer   ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_error_responses() {
        assert_eq!(
            unauthorized_response("nope").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(forbidden_response("nope").status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_user_auth_is_admin() {
        let auth = UserAuth {
            user_id: Uuid::new_v4(),
            role: UserRole::Admin,
            jti: "jti".to_string(),
            password_change_required: false,
        };
        assert!(auth.is_admin());
        let scanner = UserAuth {
            role: UserRole::User,
            ..auth
        };
        assert!(!scanner.is_admin());
    }
}
