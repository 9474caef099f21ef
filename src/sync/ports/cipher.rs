//! Credential encryption port.

use crate::sync::domain::EncryptedSecret;
use thiserror::Error;

/// Encrypts and decrypts tokens stored at rest.
///
/// Implementations are constructed once with their key material and
/// injected wherever credentials are read or written.
pub trait CredentialCipher: Send + Sync {
    /// Encrypts a plaintext token.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encrypt`] when encryption fails.
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, CipherError>;

    /// Decrypts a stored token.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Decrypt`] when the ciphertext is corrupt or was
    /// produced with another key.
    fn decrypt(&self, secret: &EncryptedSecret) -> Result<String, CipherError>;
}

/// Errors returned by credential ciphers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    /// Encryption failed.
    #[error("credential encryption failed: {0}")]
    Encrypt(String),

    /// Decryption failed.
    #[error("credential decryption failed: {0}")]
    Decrypt(String),
}
