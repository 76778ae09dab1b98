//! Admin bootstrap service for initial setup.
//!
//! Creates the first admin on startup when configured and no admin exists
//! yet. Safe to run on every boot.

use persistence::repositories::{NewUser, UserRepository};
use shared::password::{check_password_strength, hash_password, PasswordError};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AdminBootstrapConfig;

/// Error types for admin bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] PasswordError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// What bootstrap did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    NotConfigured,
    AdminExists,
    Created(Uuid),
}

/// Bootstrap the first admin if configured and not already done.
///
/// Call after migrations. The admin count check and the insert share one
/// transaction.
pub async fn bootstrap_admin(
    pool: &PgPool,
    config: &AdminBootstrapConfig,
) -> Result<BootstrapOutcome, BootstrapError> {
    let email = config.bootstrap_email.trim();
    if email.is_empty() {
        return Ok(BootstrapOutcome::NotConfigured);
    }

    if config.bootstrap_password.is_empty() {
        warn!(
            "CHECKIN__ADMIN__BOOTSTRAP_EMAIL is set but CHECKIN__ADMIN__BOOTSTRAP_PASSWORD is empty - skipping bootstrap"
        );
        return Ok(BootstrapOutcome::NotConfigured);
    }
    check_password_strength(&config.bootstrap_password).map_err(BootstrapError::Config)?;

    let mut tx = pool.begin().await?;

    if UserRepository::count_admins_in_tx(&mut tx).await? > 0 {
        info!("Admin user already exists - skipping bootstrap");
        return Ok(BootstrapOutcome::AdminExists);
    }

    let password_hash = hash_password(&config.bootstrap_password)?;
    let admin = UserRepository::create_in_tx(
        &mut tx,
        &NewUser {
            name: &config.bootstrap_name,
            role: "ADMIN",
            enabled: true,
            email: Some(email),
            pin_hash: None,
            password_hash: Some(&password_hash),
            is_first_login: false,
        },
    )
    .await?;

    tx.commit().await?;

    info!(
        email = %email,
        user_id = %admin.id,
        "Bootstrap admin user created successfully"
    );
    warn!(
        "SECURITY: Remove CHECKIN__ADMIN__BOOTSTRAP_EMAIL and CHECKIN__ADMIN__BOOTSTRAP_PASSWORD \
         from configuration after initial setup"
    );

    Ok(BootstrapOutcome::Created(admin.id))
}
