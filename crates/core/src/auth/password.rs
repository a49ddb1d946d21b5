//! Password hashing
//!
//! Adaptive hashing via Argon2id with per-password random salts. Digests are
//! stored in PHC string format and never leave the store layer.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{CoreError, Result};

/// Minimum accepted password length on create/change.
pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(plain: &str) -> Result<String> {
    if plain.len() < MIN_PASSWORD_LEN {
        return Err(CoreError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::Internal(format!("password hashing failed: {}", e)))
}

/// Check a candidate password against a stored digest. A digest that does
/// not parse counts as a mismatch, not an internal error, so login failures
/// stay indistinguishable from unknown accounts.
pub fn verify_password(plain: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let digest = hash_password("Password123!").unwrap();
        assert!(verify_password("Password123!", &digest));
        assert!(!verify_password("Password124!", &digest));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("Password123!").unwrap();
        let b = hash_password("Password123!").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_password_rejected() {
        let err = hash_password("short").unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_unparseable_digest_is_mismatch() {
        assert!(!verify_password("whatever", "not-a-phc-string"));
    }
}
