//! Admin secret handling.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString, rand_core::OsRng},
};

/// Prefix shared by every argon2 PHC string.
const ARGON2_PREFIX: &str = "$argon2";

/// Admin configuration holding the argon2-hashed admin secret.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    /// Whether a configured secret is already an argon2 hash rather than
    /// plaintext.
    pub fn is_hashed(secret: &str) -> bool {
        secret.starts_with(ARGON2_PREFIX)
    }

    /// Hash a plaintext secret with a fresh random salt.
    pub fn hash_plaintext(plaintext: &str) -> Result<String, password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    }

    /// Verify a plaintext secret presented by an admin client.
    pub fn verify_secret(&self, plaintext: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.secret_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
