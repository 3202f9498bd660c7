//! Room password hashing and the password gate.
//!
//! Secrets are stored as Argon2id PHC strings and compared with the
//! library's constant-time verifier; the plaintext never reaches the
//! store. Callers on gated request paths own the fixed failure delay:
//! it is request-layer latency, and no lock or connection may be held
//! while sleeping.

use argon2::password_hash::{Error as HashError, SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::AuthError;

/// Hash a plaintext room password into a PHC string (Argon2id, fresh
/// random salt). Empty passwords are rejected rather than hashed.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    if password.is_empty() {
        return Err(AuthError::PasswordHash("password cannot be empty".into()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::InvalidPassword);
    }
    if hash.is_empty() {
        return Err(AuthError::PasswordHash("stored hash is empty".into()));
    }

    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(()),
        Err(HashError::Password) => Err(AuthError::InvalidPassword),
        Err(e) => Err(AuthError::PasswordHash(e.to_string())),
    }
}

/// The room password gate: a room without a stored secret is public and
/// admits any presented value, including the empty string; a room with
/// one requires an exact match.
pub fn check_room_password(stored_hash: Option<&str>, presented: &str) -> Result<(), AuthError> {
    match stored_hash {
        None => Ok(()),
        Some(hash) => verify_password(presented, hash),
    }
}
