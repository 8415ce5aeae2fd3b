//! Argon2 password hashing. Plaintext never leaves this module's call
//! frames; only the PHC-format hash string is stored.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Derive a fresh salted hash for storage.
pub fn hash(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Check a login attempt against a stored hash. A mismatch is `Ok(false)`;
/// `Err` means the stored hash itself is unreadable.
pub fn check(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is malformed");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_hash_checks_out() {
        let hashed = hash("Fitdnu12!").expect("hashing should succeed");
        assert!(check("Fitdnu12!", &hashed).expect("check should succeed"));
        assert!(!hashed.contains("Fitdnu12!"));
    }

    #[test]
    fn wrong_password_is_a_clean_false() {
        let hashed = hash("first-password").expect("hashing should succeed");
        assert!(!check("second-password", &hashed).expect("check should not error"));
    }

    #[test]
    fn two_hashes_of_one_password_differ() {
        // Fresh salt each time.
        let a = hash("same").unwrap();
        let b = hash("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unreadable_stored_hash_is_an_error() {
        assert!(check("anything", "not-a-phc-string").is_err());
    }
}
