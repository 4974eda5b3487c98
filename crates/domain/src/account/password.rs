//! Argon2id password hashing.
//!
//! Hashing is CPU-bound, so both operations run on the blocking pool.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{DomainError, Result};

/// Hashes a password into a PHC string with a fresh random salt.
pub async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| DomainError::Crypto(format!("hash error: {e}")))
    })
    .await
    .map_err(|e| DomainError::Crypto(format!("hashing task failed: {e}")))?
}

/// Verifies a password against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch and `Err(Crypto)` if the stored hash is
/// malformed.
pub async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash)
            .map_err(|e| DomainError::Crypto(format!("invalid hash format: {e}")))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(DomainError::Crypto(format!("verify error: {e}"))),
        }
    })
    .await
    .map_err(|e| DomainError::Crypto(format!("hashing task failed: {e}")))?
}
