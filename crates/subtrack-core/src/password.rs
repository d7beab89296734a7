//! Password hashing with Argon2id

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::error::{Error, Result};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password with a random salt (PHC string format)
pub fn hash_password(password: &str) -> Result<String> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(hashing_failed)?;

    Ok(hash.to_string())
}

/// A hashing failure is an internal fault, not a rejected credential
fn hashing_failed(err: argon2::password_hash::Error) -> Error {
    Error::InvalidData(format!("Failed to hash password: {}", err))
}

/// Check a password against a stored hash
///
/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
