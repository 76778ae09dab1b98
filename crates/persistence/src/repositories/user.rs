//! User repository for database operations.

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::entities::UserEntity;
use crate::metrics::QueryTimer;

const USER_COLUMNS: &str = "id, name, role, enabled, email, pin_hash, password_hash, \
                            is_first_login, created_at, updated_at";

/// Fields for a new user row.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub role: &'a str,
    pub enabled: bool,
    pub email: Option<&'a str>,
    pub pin_hash: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub is_first_login: bool,
}

/// Partial update of a user. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges<'a> {
    pub name: Option<&'a str>,
    pub role: Option<&'a str>,
    pub enabled: Option<bool>,
    pub email: Option<&'a str>,
    pub pin_hash: Option<&'a str>,
}

/// Repository for user-related database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new UserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a user by email address, case-insensitively.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_email");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a scanner by the lookup hash of its PIN.
    pub async fn find_by_pin_hash(&self, pin_hash: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_pin_hash");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE pin_hash = $1"
        ))
        .bind(pin_hash)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List users, optionally filtered by role and enabled flag.
    pub async fn list(
        &self,
        role: Option<&str>,
        enabled: Option<bool>,
    ) -> Result<Vec<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_users");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE ($1::TEXT IS NULL OR role = $1)
              AND ($2::BOOLEAN IS NULL OR enabled = $2)
            ORDER BY role, name, id
            "#
        ))
        .bind(role)
        .bind(enabled)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Display names for the given user IDs.
    pub async fn names_by_ids(&self, ids: &[Uuid]) -> Result<Vec<(Uuid, String)>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_names");
        let result = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT id, name FROM users WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Create a new user.
    pub async fn create(&self, user: &NewUser<'_>) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_user");
        let mut conn = self.pool.acquire().await?;
        let result = insert_user(&mut *conn, user).await;
        timer.record();
        result
    }

    /// Create a user inside an existing transaction.
    pub async fn create_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user: &NewUser<'_>,
    ) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_user");
        let result = insert_user(&mut **tx, user).await;
        timer.record();
        result
    }

    /// Apply a partial update.
    pub async fn update(
        &self,
        id: Uuid,
        changes: &UserChanges<'_>,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_user");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                role = COALESCE($3, role),
                enabled = COALESCE($4, enabled),
                email = COALESCE($5, email),
                pin_hash = COALESCE($6, pin_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.role)
        .bind(changes.enabled)
        .bind(changes.email)
        .bind(changes.pin_hash)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Store a new password hash and end the first-login state.
    pub async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_user_password");
        let result = sqlx::query_as::<_, UserEntity>(&format!(
            r#"
            UPDATE users
            SET password_hash = $2, is_first_login = FALSE, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Delete a user. Returns false if no row matched.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_user");
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    /// Count admins, used by bootstrap inside its transaction.
    pub async fn count_admins_in_tx(
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_admins");
        let result = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = 'ADMIN'")
            .fetch_one(&mut **tx)
            .await;
        timer.record();
        result
    }
}

async fn insert_user(
    conn: &mut sqlx::PgConnection,
    user: &NewUser<'_>,
) -> Result<UserEntity, sqlx::Error> {
    sqlx::query_as::<_, UserEntity>(&format!(
        r#"
        INSERT INTO users (name, role, enabled, email, pin_hash, password_hash, is_first_login)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.name)
    .bind(user.role)
    .bind(user.enabled)
    .bind(user.email)
    .bind(user.pin_hash)
    .bind(user.password_hash)
    .bind(user.is_first_login)
    .fetch_one(conn)
    .await
}
