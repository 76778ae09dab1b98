//! Authentication service: PIN and password login, refresh, password rotation.

use domain::models::user::{AuthResponse, TokenPair, User, UserRole};
use persistence::entities::UserEntity;
use persistence::repositories::UserRepository;
use shared::crypto::pin_lookup_hash;
use shared::jwt::{extract_user_id, JwtConfig, JwtError, TokenSubject};
use shared::password::{check_password_strength, hash_password, verify_password, PasswordError};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtAuthConfig;
use crate::error::ApiError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User is disabled")]
    UserDisabled,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Only admins can change their password")]
    NotAnAdmin,

    #[error("Password does not meet requirements: {0}")]
    WeakPassword(String),

    #[error("Token error: {0}")]
    Token(#[from] JwtError),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::Unauthorized("Invalid credentials".into()),
            AuthError::UserDisabled => ApiError::Forbidden("Account is disabled".into()),
            AuthError::UserNotFound => ApiError::NotFound("User not found".into()),
            AuthError::InvalidRefreshToken => {
                ApiError::Unauthorized("Invalid or expired refresh token".into())
            }
            AuthError::NotAnAdmin => {
                ApiError::Forbidden("Only admins can change their password".into())
            }
            AuthError::WeakPassword(msg) => ApiError::validation(msg),
            AuthError::Token(e) => e.into(),
            AuthError::Password(e) => e.into(),
            AuthError::Database(e) => e.into(),
        }
    }
}

/// Converts literal `\n` sequences to newlines and strips wrapping quotes,
/// so PEM keys survive being passed through environment variables.
pub fn normalize_pem_key(key: &str) -> String {
    key.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .replace("\\n", "\n")
}

/// Builds the token signer/verifier from configuration.
pub fn jwt_from_config(config: &JwtAuthConfig) -> Result<JwtConfig, JwtError> {
    JwtConfig::with_leeway(
        &normalize_pem_key(&config.private_key),
        &normalize_pem_key(&config.public_key),
        config.access_token_expiry_secs,
        config.refresh_token_expiry_secs,
        config.leeway_secs,
    )
}

/// Authentication service.
pub struct AuthService {
    users: UserRepository,
    jwt: Arc<JwtConfig>,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt: Arc<JwtConfig>) -> Self {
        Self {
            users: UserRepository::new(pool),
            jwt,
        }
    }

    /// Scanner login. The PIN must belong to an enabled USER.
    pub async fn scanner_login(&self, pin: &str) -> Result<AuthResponse, AuthError> {
        let user = self
            .users
            .find_by_pin_hash(&pin_lookup_hash(pin))
            .await?
            .filter(|u| u.role() == UserRole::User)
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.enabled {
            return Err(AuthError::UserDisabled);
        }

        tracing::info!(user_id = %user.id, "Scanner logged in");
        self.respond(user.into())
    }

    /// Admin login with email and password.
    pub async fn admin_login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let user = self
            .users
            .find_by_email(email.trim())
            .await?
            .filter(|u| u.role() == UserRole::Admin)
            .ok_or(AuthError::InvalidCredentials)?;

        self.check_password(&user, password)?;
        if !user.enabled {
            return Err(AuthError::UserDisabled);
        }

        tracing::info!(
            user_id = %user.id,
            first_login = user.is_first_login,
            "Admin logged in"
        );
        self.respond(user.into())
    }

    /// Exchanges a refresh token for a new pair. The user is re-read so
    /// role changes and disabling take effect.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, AuthError> {
        let claims = self
            .jwt
            .validate_refresh_token(refresh_token)
            .map_err(|e| match e {
                JwtError::TokenExpired | JwtError::InvalidToken | JwtError::DecodingError(_) => {
                    AuthError::InvalidRefreshToken
                }
                other => AuthError::Token(other),
            })?;
        let user_id = extract_user_id(&claims).map_err(|_| AuthError::InvalidRefreshToken)?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;
        if !user.enabled {
            return Err(AuthError::UserDisabled);
        }

        self.respond(user.into())
    }

    /// Rotates an admin password and ends the first-login state.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<AuthResponse, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if user.role() != UserRole::Admin {
            return Err(AuthError::NotAnAdmin);
        }
        if !user.enabled {
            return Err(AuthError::UserDisabled);
        }
        self.check_password(&user, old_password)?;
        check_password_strength(new_password).map_err(AuthError::WeakPassword)?;

        let password_hash = hash_password(new_password)?;
        let updated = self
            .users
            .update_password(user_id, &password_hash)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user_id, "Admin password changed");
        self.respond(updated.into())
    }

    /// Issues an access/refresh pair for `user`.
    pub fn issue_tokens(&self, user: &User) -> Result<TokenPair, AuthError> {
        let subject = TokenSubject {
            user_id: user.id,
            role: user.role.as_str().to_string(),
            password_change_required: requires_password_change(user),
        };
        let (access_token, _) = self.jwt.generate_access_token(&subject)?;
        let (refresh_token, _) = self.jwt.generate_refresh_token(&subject)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.jwt.access_token_expiry_secs,
        })
    }

    fn respond(&self, user: User) -> Result<AuthResponse, AuthError> {
        let tokens = self.issue_tokens(&user)?;
        Ok(AuthResponse {
            requires_password_change: requires_password_change(&user),
            user,
            tokens,
        })
    }

    fn check_password(&self, user: &UserEntity, password: &str) -> Result<(), AuthError> {
        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        if verify_password(password, hash)? {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Only admins are ever forced to rotate a password.
fn requires_password_change(user: &User) -> bool {
    user.role.is_admin() && user.is_first_login
}
