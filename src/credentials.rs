//! Password hashing and bearer-token primitives.
//!
//! Stored hash format: `pbkdf2_sha256$<iterations>$<salt b64>$<hash b64>`.
//! Verification reads the iteration count from the stored value, so the
//! work factor can be raised without invalidating existing accounts.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const SCHEME: &str = "pbkdf2_sha256";
const PBKDF2_ITERATIONS: u32 = if cfg!(test) { 1_000 } else { 100_000 };
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("Malformed password hash")]
    MalformedHash,
    #[error("Password must not be empty")]
    EmptyPassword,
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, CredentialsError> {
    if password.is_empty() {
        return Err(CredentialsError::EmptyPassword);
    }
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    let hash = derive(password, &salt, PBKDF2_ITERATIONS);
    Ok(format!(
        "{SCHEME}${PBKDF2_ITERATIONS}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    ))
}

/// Constant-time check of `password` against a stored hash.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, CredentialsError> {
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(hash), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CredentialsError::MalformedHash);
    };
    let iterations: u32 = iterations.parse().map_err(|_| CredentialsError::MalformedHash)?;
    let salt = STANDARD_NO_PAD.decode(salt).map_err(|_| CredentialsError::MalformedHash)?;
    let expected = STANDARD_NO_PAD.decode(hash).map_err(|_| CredentialsError::MalformedHash)?;
    if iterations == 0 || expected.len() != HASH_LENGTH {
        return Err(CredentialsError::MalformedHash);
    }

    let actual = derive(password, &salt, iterations);
    Ok(actual.as_slice().ct_eq(expected.as_slice()).into())
}

/// Random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 of a bearer token. Only this digest is stored.
pub fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}
