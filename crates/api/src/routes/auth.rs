//! Authentication routes: scanner PIN login, admin login, refresh, password change.

use axum::{extract::State, Json};
use domain::models::user::{
    AdminLoginRequest, AuthResponse, ChangePasswordRequest, RefreshRequest, ScannerLoginRequest,
    User,
};
use persistence::repositories::UserRepository;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::record_login_attempt;
use crate::middleware::UserAuth;
use crate::services::auth::{AuthError, AuthService};

fn service(state: &AppState) -> AuthService {
    AuthService::new(state.pool.clone(), state.jwt.clone())
}

fn log_failure(kind: &'static str, err: &AuthError) {
    match err {
        AuthError::Database(_) | AuthError::Token(_) | AuthError::Password(_) => {
            tracing::error!(kind, error = %err, "Login failed")
        }
        _ => tracing::info!(kind, reason = %err, "Login refused"),
    }
}

/// Scanner login with a PIN.
///
/// POST /api/v1/auth/scanner-login
pub async fn scanner_login(
    State(state): State<AppState>,
    Json(request): Json<ScannerLoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    request.validate()?;

    match service(&state).scanner_login(&request.pin).await {
        Ok(response) => {
            record_login_attempt("scanner", true);
            Ok(Json(response))
        }
        Err(err) => {
            record_login_attempt("scanner", false);
            log_failure("scanner", &err);
            Err(err.into())
        }
    }
}

/// Admin login with email and password.
///
/// POST /api/v1/auth/admin-login
///
/// A first-login admin gets `requiresPasswordChange` and can only reach
/// the password change endpoint until the password is rotated.
pub async fn admin_login(
    State(state): State<AppState>,
    Json(request): Json<AdminLoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    request.validate()?;

    match service(&state)
        .admin_login(&request.email, &request.password)
        .await
    {
        Ok(response) => {
            record_login_attempt("admin", true);
            Ok(Json(response))
        }
        Err(err) => {
            record_login_attempt("admin", false);
            log_failure("admin", &err);
            Err(err.into())
        }
    }
}

/// Exchange a refresh token for a new token pair.
///
/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    request.validate()?;

    match service(&state).refresh(&request.refresh_token).await {
        Ok(response) => {
            record_login_attempt("refresh", true);
            Ok(Json(response))
        }
        Err(err) => {
            record_login_attempt("refresh", false);
            log_failure("refresh", &err);
            Err(err.into())
        }
    }
}

/// Rotate the caller's password. Admin accounts only.
///
/// POST /api/v1/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if !user_auth.is_admin() {
        return Err(AuthError::NotAnAdmin.into());
    }
    request.validate()?;

    let response = service(&state)
        .change_password(
            user_auth.user_id,
            &request.old_password,
            &request.new_password,
        )
        .await?;
    Ok(Json(response))
}

/// Profile of the authenticated caller.
///
/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<User>, ApiError> {
    let user = UserRepository::new(state.pool.clone())
        .find_by_id(user_auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}
