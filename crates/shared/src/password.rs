//! Admin password hashing using Argon2id.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

/// Error type for password operations.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Minimum accepted length for a new admin password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

// OWASP 2024 Argon2id parameters: 19 MiB, 2 iterations, 1 lane.
const MEMORY_COST: u32 = 19456;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;
const OUTPUT_LEN: usize = 32;

fn create_argon2() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_COST, TIME_COST, PARALLELISM, Some(OUTPUT_LEN))
        .map_err(|e| PasswordError::HashError(format!("Failed to create Argon2 params: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password and returns a PHC-formatted string.
///
/// ```
/// use shared::password::hash_password;
///
/// let hash = hash_password("correct horse").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = create_argon2()?;

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

/// Verifies a password against a stored PHC hash.
///
/// Returns `Ok(false)` on mismatch; errors only when the hash is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    // Parameters come from the stored hash.
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Checks the minimum rules for a new admin password.
///
/// Returns a human-readable reason on rejection.
pub fn check_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("Password cannot be entirely numeric".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_returns_phc_format() {
        let hash = hash_password("test_password").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
    }

    #[test]
    fn test_hash_password_salted() {
        assert_ne!(
            hash_password("same_password").unwrap(),
            hash_password("same_password").unwrap()
        );
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("Adm1n-secret").unwrap();
        assert!(verify_password("Adm1n-secret", &hash).unwrap());
        assert!(!verify_password("adm1n-secret", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        let result = verify_password("password", "plain-text-temp");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_strength_too_short() {
        let err = check_password_strength("abc12").unwrap_err();
        assert!(err.contains("at least 8"));
    }

    #[test]
    fn test_strength_numeric_only() {
        assert!(check_password_strength("1234567890").is_err());
    }

    #[test]
    fn test_strength_accepts_reasonable_password() {
        assert!(check_password_strength("checkin-2024").is_ok());
    }

    #[test]
    fn test_strength_counts_characters_not_bytes() {
        // 7 multi-byte characters are still too short.
        assert!(check_password_strength("ééééééé").is_err());
    }
}
