//! Cryptographic utilities for credential lookup and secret generation.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Characters used for generated temporary passwords.
const TEMP_PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated temporary admin passwords.
pub const TEMP_PASSWORD_LENGTH: usize = 12;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash used to look up a scanner by PIN.
///
/// PINs must be unique and are resolved by equality at login, so they are
/// stored as a deterministic digest rather than a salted hash.
pub fn pin_lookup_hash(pin: &str) -> String {
    sha256_hex(&format!("scanner-pin:{}", pin.trim()))
}

/// Generates a random alphanumeric temporary password.
pub fn generate_temp_password() -> String {
    let mut rng = rand::thread_rng();
    (0..TEMP_PASSWORD_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..TEMP_PASSWORD_CHARSET.len());
            TEMP_PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_sha256_hex_empty_string() {
        let hash = sha256_hex("");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_pin_lookup_hash_deterministic() {
        assert_eq!(pin_lookup_hash("1234"), pin_lookup_hash("1234"));
        assert_ne!(pin_lookup_hash("1234"), pin_lookup_hash("4321"));
    }

    #[test]
    fn test_pin_lookup_hash_ignores_surrounding_whitespace() {
        assert_eq!(pin_lookup_hash(" 1234 "), pin_lookup_hash("1234"));
    }

    #[test]
    fn test_pin_lookup_hash_differs_from_plain_sha() {
        assert_ne!(pin_lookup_hash("1234"), sha256_hex("1234"));
    }

    #[test]
    fn test_generate_temp_password_shape() {
        let password = generate_temp_password();
        assert_eq!(password.len(), TEMP_PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_temp_password_unique() {
        assert_ne!(generate_temp_password(), generate_temp_password());
    }
}
