//! Reversible stand-in for a real credential cipher.

use crate::sync::domain::EncryptedSecret;
use crate::sync::ports::{CipherError, CredentialCipher};

const MARKER: &[u8] = b"plain:";

/// Cipher that stores tokens unencrypted behind a marker prefix.
///
/// Only suitable for tests and local development. The marker lets
/// [`CredentialCipher::decrypt`] reject ciphertext produced by another
/// cipher instead of handing garbage to a provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCipher;

impl PlaintextCipher {
    /// Creates the cipher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CredentialCipher for PlaintextCipher {
    fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, CipherError> {
        let mut bytes = MARKER.to_vec();
        bytes.extend_from_slice(plaintext.as_bytes());
        Ok(EncryptedSecret::new(bytes))
    }

    fn decrypt(&self, secret: &EncryptedSecret) -> Result<String, CipherError> {
        let body = secret
            .as_bytes()
            .strip_prefix(MARKER)
            .ok_or_else(|| CipherError::Decrypt("unrecognised ciphertext".to_owned()))?;
        String::from_utf8(body.to_vec()).map_err(|err| CipherError::Decrypt(err.to_string()))
    }
}
