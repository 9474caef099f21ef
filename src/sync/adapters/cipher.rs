//! Authenticated encryption of stored tracker credentials.

use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

use crate::sync::domain::EncryptedSecret;
use crate::sync::ports::{CipherError, CredentialCipher};

/// Length of the `ChaCha20-Poly1305` key in bytes.
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;
const ENVELOPE_VERSION: u8 = 1;

/// `ChaCha20-Poly1305` cipher for tokens at rest.
///
/// Every secret is sealed under a fresh random nonce. The stored envelope is
/// a version byte, the nonce, and the ciphertext with its authentication
/// tag, so a secret written under another key or altered in storage fails
/// to decrypt instead of yielding a corrupted token.
#[derive(Clone)]
pub struct ChaChaCredentialCipher {
    key: [u8; KEY_LEN],
}

impl ChaChaCredentialCipher {
    /// Creates a cipher from raw key material.
    #[must_use]
    pub const fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Derives the key from a configured secret string.
    ///
    /// The secret should be long and random; the derivation is a single
    /// SHA-256 digest, not a password hash.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        Self::new(Sha256::digest(secret.as_bytes()).into())
    }

    fn aead(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.key))
    }
}

impl fmt::Debug for ChaChaCredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaChaCredentialCipher").finish_non_exhaustive()
    }
}

impl CredentialCipher for ChaChaCredentialCipher {
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, CipherError> {
        let nonce_source = Uuid::new_v4();
        let nonce_bytes: &[u8; NONCE_LEN] = nonce_source
            .as_bytes()
            .first_chunk()
            .ok_or_else(|| CipherError::Encrypt("nonce source too short".to_owned()))?;
        let ciphertext = self
            .aead()
            .encrypt(Nonce::from_slice(nonce_bytes), plaintext.as_bytes())
            .map_err(|err| CipherError::Encrypt(err.to_string()))?;
        let mut envelope = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        envelope.push(ENVELOPE_VERSION);
        envelope.extend_from_slice(nonce_bytes);
        envelope.extend_from_slice(&ciphertext);
        Ok(EncryptedSecret::new(envelope))
    }

    fn decrypt(&self, secret: &EncryptedSecret) -> Result<String, CipherError> {
        let Some((&version, sealed)) = secret.as_bytes().split_first() else {
            return Err(CipherError::Decrypt("empty ciphertext".to_owned()));
        };
        if version != ENVELOPE_VERSION {
            return Err(CipherError::Decrypt(format!(
                "unsupported envelope version {version}"
            )));
        }
        let (nonce_bytes, ciphertext) = sealed
            .split_at_checked(NONCE_LEN)
            .ok_or_else(|| CipherError::Decrypt("truncated ciphertext".to_owned()))?;
        let plaintext = self
            .aead()
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CipherError::Decrypt("authentication failed".to_owned()))?;
        String::from_utf8(plaintext).map_err(|err| CipherError::Decrypt(err.to_string()))
    }
}
