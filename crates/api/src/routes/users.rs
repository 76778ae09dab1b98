//! Admin user management routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::user::{
    CreateUserRequest, CreateUserResponse, ListUsersQuery, UpdateUserRequest, User, UserRole,
};
use persistence::entities::UserEntity;
use persistence::repositories::{NewUser, UserChanges, UserRepository};
use serde::Serialize;
use shared::crypto::{generate_temp_password, pin_lookup_hash};
use shared::password::hash_password;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;

/// Response for user listing.
#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<User>,
    pub total: usize,
}

/// Maps unique index violations to a conflict naming the clashing field.
fn conflict_on_unique(err: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.constraint() {
            Some("idx_users_pin_hash") => {
                return ApiError::Conflict("PIN is already in use".to_string())
            }
            Some("idx_users_email_lower") => {
                return ApiError::Conflict("Email is already in use".to_string())
            }
            _ => {}
        }
    }
    err.into()
}

async fn find_user(repo: &UserRepository, user_id: Uuid) -> Result<UserEntity, ApiError> {
    repo.find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// List users.
///
/// GET /api/v1/users?role=USER&enabled=true
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ListUsersResponse>, ApiError> {
    let users: Vec<User> = UserRepository::new(state.pool.clone())
        .list(query.role.as_ref().map(UserRole::as_str), query.enabled)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    let total = users.len();
    Ok(Json(ListUsersResponse { users, total }))
}

/// Get a user.
///
/// GET /api/v1/users/:user_id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    let user = find_user(&UserRepository::new(state.pool.clone()), user_id).await?;
    Ok(Json(user.into()))
}

/// Create an admin or scanner account.
///
/// POST /api/v1/users
///
/// Admins created without a password get a temporary one, returned only in
/// this response, and must change it at first login.
pub async fn create_user(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), ApiError> {
    request.validate()?;

    let pin_hash = request.pin.as_deref().map(pin_lookup_hash);
    let email = request.email.as_deref().map(str::trim);

    let (password, temporary_password) = match (request.role, request.password.as_deref()) {
        (UserRole::Admin, Some(password)) => (Some(password.to_string()), None),
        (UserRole::Admin, None) => {
            let temp = generate_temp_password();
            (Some(temp.clone()), Some(temp))
        }
        (UserRole::User, _) => (None, None),
    };
    let password_hash = password.as_deref().map(hash_password).transpose()?;

    let created = UserRepository::new(state.pool.clone())
        .create(&NewUser {
            name: request.name.trim(),
            role: request.role.as_str(),
            enabled: request.enabled,
            email,
            pin_hash: pin_hash.as_deref(),
            password_hash: password_hash.as_deref(),
            is_first_login: temporary_password.is_some(),
        })
        .await
        .map_err(conflict_on_unique)?;

    info!(
        user_id = %created.id,
        role = %request.role,
        created_by = %user_auth.user_id,
        "User created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            user: created.into(),
            temporary_password,
        }),
    ))
}

/// Update a user. Absent fields are left unchanged.
///
/// PUT/PATCH /api/v1/users/:user_id
pub async fn update_user(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    request.validate()?;

    let repo = UserRepository::new(state.pool.clone());
    let current = find_user(&repo, user_id).await?;

    // A role change must leave the account with the credential its new role logs in with
    match request.role {
        Some(UserRole::User) if current.pin_hash.is_none() && request.pin.is_none() => {
            return Err(ApiError::validation("Scanner accounts require a PIN"));
        }
        Some(UserRole::Admin) if current.email.is_none() && request.email.is_none() => {
            return Err(ApiError::validation("Admin accounts require an email"));
        }
        _ => {}
    }

    if user_id == user_auth.user_id
        && (request.enabled == Some(false) || request.role == Some(UserRole::User))
    {
        return Err(ApiError::Conflict(
            "You cannot disable or demote your own account".to_string(),
        ));
    }

    let pin_hash = request.pin.as_deref().map(pin_lookup_hash);
    let updated = repo
        .update(
            user_id,
            &UserChanges {
                name: request.name.as_deref().map(str::trim),
                role: request.role.as_ref().map(UserRole::as_str),
                enabled: request.enabled,
                email: request.email.as_deref().map(str::trim),
                pin_hash: pin_hash.as_deref(),
            },
        )
        .await
        .map_err(conflict_on_unique)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!(user_id = %user_id, updated_by = %user_auth.user_id, "User updated");
    Ok(Json(updated.into()))
}

/// Delete a user. Scans recorded by a deleted scanner are kept.
///
/// DELETE /api/v1/users/:user_id
pub async fn delete_user(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if user_id == user_auth.user_id {
        return Err(ApiError::Conflict(
            "You cannot delete your own account".to_string(),
        ));
    }

    let deleted = UserRepository::new(state.pool.clone())
        .delete(user_id)
        .await?;
    if !deleted {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    info!(user_id = %user_id, deleted_by = %user_auth.user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
