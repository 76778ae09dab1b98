//! User entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::user::{User, UserRole};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub enabled: bool,
    pub email: Option<String>,
    pub pin_hash: Option<String>,
    pub password_hash: Option<String>,
    pub is_first_login: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserEntity {
    /// Stored role. Unknown values get scanner privileges only.
    pub fn role(&self) -> UserRole {
        self.role.parse().unwrap_or_else(|_| {
            tracing::warn!(user_id = %self.id, role = %self.role, "Unrecognised stored role");
            UserRole::User
        })
    }
}

impl From<UserEntity> for User {
    fn from(entity: UserEntity) -> Self {
        Self {
            role: entity.role(),
            id: entity.id,
            name: entity.name,
            enabled: entity.enabled,
            email: entity.email,
            is_first_login: entity.is_first_login,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
