//! Password hashing and verification.
//!
//! The core depends on the [`CredentialService`] trait only. The default
//! implementation, [`Argon2Credentials`], uses the argon2id variant and
//! produces PHC-formatted digests that carry their own salt and
//! parameters.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{CoreError, Result};

/// Hashes and verifies passwords.
pub trait CredentialService: Send + Sync {
    /// Hashes a plaintext password into a self-describing digest.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Credential`] if hashing fails.
    fn hash(&self, plaintext: &str) -> Result<String>;

    /// Checks a plaintext password against a digest.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Credential`] if the digest is malformed.
    /// Callers treat any error as "not authenticated".
    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool>;
}

/// Argon2id credential service with default parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Credentials;

impl CredentialService for Argon2Credentials {
    fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CoreError::Credential(format!("Failed to hash password: {e}")))
    }

    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool> {
        let parsed = PasswordHash::new(digest)
            .map_err(|e| CoreError::Credential(format!("Invalid password hash format: {e}")))?;

        Ok(Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok())
    }
}
