//! Salted password hashing for the credentials provider.
//!
//! Stored format is `hex(salt):hex(key)`: a 16-byte random salt and a 64-byte
//! Argon2id key derived from it with the crate's default cost parameters.

use argon2::Argon2;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::{CoreError, CoreResult};

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 64;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> CoreResult<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(password, &salt, KEY_LEN)
        .map_err(|e| CoreError::InternalError(format!("Password hashing failed: {}", e)))?;

    Ok(format!("{}:{}", hex::encode(salt), hex::encode(key)))
}

/// Check a plaintext password against a stored `salt:key` string.
///
/// Anything malformed (no delimiter, empty halves, bad hex) is a mismatch, not an error.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, key_hex)) = stored.split_once(':') else {
        return false;
    };
    if salt_hex.is_empty() || key_hex.is_empty() {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(key_hex)) else {
        return false;
    };

    match derive_key(password, &salt, expected.len()) {
        Ok(actual) => constant_time_eq(&actual, &expected),
        Err(e) => {
            tracing::warn!("Stored password hash rejected by KDF: {}", e);
            false
        }
    }
}

/// Minimum length check, counted in characters.
pub fn validate_password_strength(password: &str, min_length: usize) -> Result<(), String> {
    if password.chars().count() < min_length {
        return Err(format!("Password must be at least {} characters long", min_length));
    }
    Ok(())
}

fn derive_key(password: &str, salt: &[u8], len: usize) -> Result<Vec<u8>, argon2::Error> {
    let mut out = vec![0u8; len];
    Argon2::default().hash_password_into(password.as_bytes(), salt, &mut out)?;
    Ok(out)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
